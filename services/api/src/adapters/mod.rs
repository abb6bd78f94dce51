pub mod db;
pub mod mailer;
pub mod media;

pub use db::DbAdapter;
pub use mailer::LogMailer;
pub use media::LocalMediaStore;
