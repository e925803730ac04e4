//! Verification email content.

pub struct VerificationEmail {
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl VerificationEmail {
    pub fn new(code: &str, ttl_minutes: i64) -> Self {
        let subject = "Email Verification OTP".to_string();

        let text = format!(
            "Thank you for registering. To verify your email address, use the \
             following OTP:\n\n{code}\n\nThis OTP will expire in {ttl_minutes} \
             minutes.\n\nIf you did not request this verification, please \
             ignore this email.\n"
        );

        let html = format!(
            r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
  <h2 style="text-align: center;">Email Verification</h2>
  <p>Thank you for registering. To verify your email address, please use the following OTP:</p>
  <div style="padding: 10px; text-align: center; font-size: 24px; font-weight: bold; letter-spacing: 5px;">{code}</div>
  <p>This OTP will expire in {ttl_minutes} minutes.</p>
  <p>If you did not request this verification, please ignore this email.</p>
</div>"#
        );

        Self { subject, text, html }
    }
}
