/// 摄像头 (Camera worker + mailbox)
pub mod mailbox;
pub mod worker;

pub use mailbox::{mailbox, MailboxReceiver, MailboxSender, PublishError, Received, Sample};
pub use worker::{CameraWorker, WorkerExit, WorkerMode, WorkerReport};
