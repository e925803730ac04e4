//! SMTP delivery via lettre.

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
};
use tracing::info;

use crate::templates::VerificationEmail;
use crate::{MailerError, Notifier};

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
    otp_ttl_minutes: i64,
}

impl SmtpNotifier {
    pub fn new(
        host: &str,
        port: u16,
        username: Option<String>,
        password: Option<String>,
        from: String,
        otp_ttl_minutes: i64,
    ) -> Result<Self, MailerError> {
        let tls_params = TlsParameters::new(host.to_string())
            .map_err(|e| MailerError::InvalidConfig(format!("TLS configuration error: {}", e)))?;

        // Port 465 is implicit TLS (SMTPS), everything else STARTTLS.
        let mut builder = if port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .map_err(|e| MailerError::InvalidConfig(format!("SMTP relay error: {}", e)))?
                .port(port)
                .tls(Tls::Wrapper(tls_params))
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| MailerError::InvalidConfig(format!("SMTP relay error: {}", e)))?
                .port(port)
                .tls(Tls::Required(tls_params))
        };

        if let (Some(user), Some(pass)) = (username, password) {
            builder = builder.credentials(Credentials::new(user, pass));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            otp_ttl_minutes,
        })
    }
}

#[async_trait::async_trait]
impl Notifier for SmtpNotifier {
    async fn send_otp(&self, to: &str, code: &str) -> Result<(), MailerError> {
        let content = VerificationEmail::new(code, self.otp_ttl_minutes);

        let message = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| MailerError::InvalidConfig(format!("Invalid from address: {}", e)))?,
            )
            .to(to
                .parse()
                .map_err(|e| MailerError::InvalidConfig(format!("Invalid to address: {}", e)))?)
            .subject(content.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(content.text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(content.html),
                    ),
            )
            .map_err(|e| MailerError::SendFailed(format!("Failed to build email: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailerError::SendFailed(e.to_string()))?;

        info!("Verification OTP sent to {}", to);
        Ok(())
    }
}
