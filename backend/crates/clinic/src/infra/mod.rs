//! Infrastructure Layer
//!
//! Hosted row store, serverless functions and their in-process stand-ins.

pub mod admins;
pub mod attempt_store;
pub mod functions;
pub mod memory;
pub mod postgrest;
pub mod remote_cipher;
pub mod supabase;

pub use admins::RowAdminRepository;
pub use attempt_store::RowAttemptStore;
pub use functions::FunctionsClient;
pub use memory::InMemoryRowStore;
pub use postgrest::PostgrestStore;
pub use remote_cipher::RemoteFieldCipher;
pub use supabase::SupabaseHttp;
