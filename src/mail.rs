mod sendmail;
pub use sendmail::Mailer;

pub mod mails;
