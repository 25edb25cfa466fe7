//! Filters recipients, renders templates and hands built messages
//! to an [`EmailSender`].

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::Address;
use tracing::{error, info};

use super::filter::RecipientFilter;
use super::template::render_message;
use super::Params;
use crate::error::EmailError;

/// Someone to notify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub name: String,
    pub address: String,
    /// Per-recipient template parameters, merged over the shared ones.
    pub params: Params,
}

impl Recipient {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            params: Params::new(),
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    fn mailbox(&self) -> Result<Mailbox, EmailError> {
        let address: Address =
            self.address
                .trim()
                .parse()
                .map_err(|e: lettre::address::AddressError| EmailError::InvalidAddress {
                    address: self.address.clone(),
                    reason: e.to_string(),
                })?;
        let name = (!self.name.is_empty()).then(|| self.name.clone());
        Ok(Mailbox::new(name, address))
    }
}

/// A rendered, fully built email ready for delivery.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub template: String,
    pub to: String,
    pub subject: String,
    /// Rendered HTML body, as placed in `message`.
    pub body: String,
    pub message: lettre::Message,
}

/// Delivery seam. Transports live outside this crate.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError>;
}

/// Sender that only logs what would have been delivered.
#[derive(Debug, Default, Clone)]
pub struct LogSender;

#[async_trait]
impl EmailSender for LogSender {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError> {
        info!(
            template = %email.template,
            to = %email.to,
            subject = %email.subject,
            bytes = email.message.formatted().len(),
            "Email dispatched"
        );
        Ok(())
    }
}

/// Renders and sends templated notifications.
pub struct Mailer {
    from: Mailbox,
    filter: RecipientFilter,
    sender: Arc<dyn EmailSender>,
}

impl Mailer {
    pub fn new(
        from_address: &str,
        filter: RecipientFilter,
        sender: Arc<dyn EmailSender>,
    ) -> Result<Self, EmailError> {
        let from = Recipient::new("", from_address).mailbox()?;
        Ok(Self {
            from,
            filter,
            sender,
        })
    }

    /// Send `template` to every allowed recipient and return how many were
    /// handed to the sender.
    ///
    /// Template errors abort the whole batch. Address or delivery failures
    /// for one recipient are logged and the rest are still attempted.
    pub async fn send(
        &self,
        template: &str,
        params: &Params,
        recipients: &[Recipient],
    ) -> Result<usize, EmailError> {
        let mut sent = 0;

        for recipient in recipients {
            if !self.filter.can_send_to(&recipient.address) {
                info!(
                    template,
                    to = %recipient.address,
                    "Skipping email, recipient not allowed"
                );
                continue;
            }

            let merged = params
                .merge(&Params::new().with("name", recipient.name.clone()))
                .merge(&recipient.params);
            let rendered = render_message(template, &merged)?;

            match self.build(template, recipient, rendered.subject, rendered.body) {
                Ok(email) => match self.sender.send(&email).await {
                    Ok(()) => sent += 1,
                    Err(e) => error!(template, to = %recipient.address, error = %e, "Failed to send email"),
                },
                Err(e) => error!(template, to = %recipient.address, error = %e, "Failed to build email"),
            }
        }

        Ok(sent)
    }

    fn build(
        &self,
        template: &str,
        recipient: &Recipient,
        subject: String,
        body: String,
    ) -> Result<OutgoingEmail, EmailError> {
        let message = lettre::Message::builder()
            .from(self.from.clone())
            .to(recipient.mailbox()?)
            .subject(subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(body.clone())
            .map_err(|e| EmailError::Build(e.to_string()))?;

        Ok(OutgoingEmail {
            template: template.to_string(),
            to: recipient.address.trim().to_string(),
            subject,
            body,
            message,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSender;
    use super::*;

    fn mailer(filter: RecipientFilter) -> (Mailer, Arc<RecordingSender>) {
        let sender = Arc::new(RecordingSender::default());
        let mailer = Mailer::new("noreply@example.com", filter, sender.clone()).unwrap();
        (mailer, sender)
    }

    #[tokio::test]
    async fn sends_to_allowed_recipients_only() {
        let (mailer, sender) = mailer(RecipientFilter::new("", r"@blocked\.com$").unwrap());
        let recipients = vec![
            Recipient::new("Jon", "jon@example.com"),
            Recipient::new("Spam", "spam@blocked.com"),
            Recipient::new("Blank", " "),
        ];

        let sent = mailer
            .send("echo_test", &Params::new(), &recipients)
            .await
            .unwrap();

        assert_eq!(sent, 1);
        assert_eq!(sender.recipients(), vec!["jon@example.com"]);
        let email = &sender.sent.lock().unwrap()[0];
        assert_eq!(email.subject, "Message to: Jon");
    }

    #[tokio::test]
    async fn recipient_params_override_shared_params() {
        let (mailer, sender) = mailer(RecipientFilter::allow_all());
        let recipient = Recipient::new("Jon", "jon@example.com")
            .with_params(Params::new().with("name", "Lord Commander"));

        mailer
            .send("echo_test", &Params::new().with("name", "ignored"), &[recipient])
            .await
            .unwrap();

        assert_eq!(
            sender.sent.lock().unwrap()[0].subject,
            "Message to: Lord Commander"
        );
    }

    #[tokio::test]
    async fn invalid_address_is_skipped_not_fatal() {
        let (mailer, sender) = mailer(RecipientFilter::allow_all());
        let recipients = vec![
            Recipient::new("Broken", "not-an-address"),
            Recipient::new("Ok", "ok@example.com"),
        ];

        let sent = mailer
            .send("echo_test", &Params::new(), &recipients)
            .await
            .unwrap();

        assert_eq!(sent, 1);
        assert_eq!(sender.recipients(), vec!["ok@example.com"]);
    }

    #[tokio::test]
    async fn unknown_template_fails_batch() {
        let (mailer, _sender) = mailer(RecipientFilter::allow_all());
        let err = mailer
            .send("nope", &Params::new(), &[Recipient::new("Jon", "jon@example.com")])
            .await
            .unwrap_err();
        assert!(matches!(err, EmailError::TemplateNotFound(_)));
    }

    #[test]
    fn rejects_invalid_from_address() {
        let err = Mailer::new("nope", RecipientFilter::allow_all(), Arc::new(LogSender)).err();
        assert!(matches!(err, Some(EmailError::InvalidAddress { .. })));
    }
}
