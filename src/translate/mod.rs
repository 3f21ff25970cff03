pub mod deepl;

pub use deepl::DeepLTranslator;

use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate every text in one request. The result has one entry per
    /// input, in input order.
    async fn translate_batch(&self, texts: &[&str], target_lang: &str) -> Result<Vec<String>>;
    fn name(&self) -> &'static str;
}
