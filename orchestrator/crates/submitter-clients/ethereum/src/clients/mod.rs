pub mod anchor_repository;
pub mod nft_registry;
pub mod provider;

pub use anchor_repository::{
    AlloyAnchorRepository, AnchorCommit, AnchorRepositoryApi, MockAnchorRepositoryApi, PreCommit,
};
pub use nft_registry::{AlloyNftRegistry, MockNftRegistryApi, NftRegistryApi, RegistryMint};
pub use provider::AlloyEthereumClient;
