pub mod cancel;
pub mod openai_provider;
pub mod provider;

pub use cancel::CancelSignal;
pub use openai_provider::OpenAiCompatibleProvider;
pub use provider::{
    ProviderAdapter, ProviderRequest, RawResponse, RequestOptions, ResponseKind, MAX_VARIATIONS,
};
