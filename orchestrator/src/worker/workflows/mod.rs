pub mod anchor;
pub mod nft;
