pub mod config;
pub mod coordinator;
pub mod finalizer;
pub mod http;
pub mod listener;
pub mod nats;
pub mod orchestrator;
pub mod repository;
pub mod session;

pub use config::Config;
pub use coordinator::{
    BotCoordinator, CoordinatorError, CoordinatorSettings, NewRecordingRequest, SpawnOutcome,
};
pub use finalizer::{
    ByteStreamConcatenator, FfmpegConcatenator, FinalizeError, FinalizedRecording, Finalizer,
    MediaConcatenator, StorageLayout,
};
pub use http::{create_router, AppState};
pub use listener::{ListenerRegistry, StatusListener};
pub use nats::{ChannelError, MemoryStatusChannel, NatsStatusChannel, StatusChannel, StatusMessage};
pub use orchestrator::{BotOrchestrator, DockerOrchestrator, DockerSettings, OrchestratorError, SpawnedBot};
pub use repository::{InMemoryRepository, MeetingFilter, MeetingRepository, RepositoryError, StatusUpdate, UserRepository};
pub use session::{DomainError, RecordingSession, SessionDraft, SessionId, SessionStatus, User, UserId};
