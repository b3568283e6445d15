/// Key prefix of persisted jobs, followed by the 20 account bytes and the 16 job id bytes.
pub const JOBS_KEY_PREFIX: &[u8] = b"jobs_v2_";
