pub mod hmdb;
pub mod massbank;
pub mod pubchem;

use async_trait::async_trait;

use crate::domain::{CompoundQuery, ProviderKind};
use crate::report::ProviderResponse;

pub use hmdb::HmdbClient;
pub use massbank::MassbankClient;
pub use pubchem::PubchemClient;

#[async_trait]
pub trait CompoundProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn search(&self, query: &CompoundQuery) -> ProviderResponse;
}
