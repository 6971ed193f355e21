pub mod balancer;
pub mod config;
pub mod openai_compatible;
pub mod router;
pub mod traits;

pub use balancer::{BalancerPolicy, FirstAvailableBalancer, LoadBalancer, RoundRobinBalancer};
pub use config::{Credentials, ModelMatch, ProviderAdapterConfig, ProviderType, Tunables};
pub use openai_compatible::OpenAICompatibleAdapter;
pub use router::{AdapterState, ProviderRouter, ResolvedProvider, RouterError};
pub use traits::{ChatRequest, ChatResponse, Message, ProviderAdapter, ProviderError, ToolCall};
