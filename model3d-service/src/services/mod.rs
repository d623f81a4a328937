pub mod generation;
pub mod memories;
pub mod providers;
pub mod source_image;
pub mod storage;
pub mod supabase;

pub use generation::{GenerationError, GenerationService, GenerationSettings};
pub use memories::{InMemoryMemoryRepository, MemoryRepository, RepositoryError};
pub use providers::{ModelProvider, ProviderError};
pub use source_image::{HttpImageFetcher, ImageFetcher, InMemoryImageFetcher};
pub use storage::{InMemoryObjectStore, ObjectStore, StorageError};
pub use supabase::SupabaseClient;
