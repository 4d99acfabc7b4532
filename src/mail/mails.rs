use super::Mailer;

const OTP_TEMPLATE: &str = include_str!("templates/Otp-email.html");
const WELCOME_TEMPLATE: &str = include_str!("templates/Welcome-email.html");
const APPLICATION_RESULT_TEMPLATE: &str = include_str!("templates/ApplicationResult-email.html");

pub fn send_otp_email(
    mailer: &Mailer,
    to_email: &str,
    name: &str,
    code: &str,
    expires_minutes: i64,
) -> Result<(), Box<dyn std::error::Error>> {
    let subject = "Your verification code";
    let placeholders = vec![
        ("{{name}}".to_string(), name.to_string()),
        ("{{code}}".to_string(), code.to_string()),
        ("{{expires}}".to_string(), expires_minutes.to_string()),
    ];

    mailer.send_email(to_email, subject, OTP_TEMPLATE, &placeholders)
}

pub fn send_welcome_email(
    mailer: &Mailer,
    to_email: &str,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let subject = "Welcome to the course marketplace";
    let placeholders = vec![("{{name}}".to_string(), name.to_string())];

    mailer.send_email(to_email, subject, WELCOME_TEMPLATE, &placeholders)
}

pub fn send_application_result_email(
    mailer: &Mailer,
    to_email: &str,
    name: &str,
    approved: bool,
    reason: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let subject = "Your instructor application";
    let outcome = if approved {
        "approved".to_string()
    } else {
        match reason {
            Some(reason) => format!("rejected: {}", reason),
            None => "rejected".to_string(),
        }
    };
    let placeholders = vec![
        ("{{name}}".to_string(), name.to_string()),
        ("{{outcome}}".to_string(), outcome),
    ];

    mailer.send_email(
        to_email,
        subject,
        APPLICATION_RESULT_TEMPLATE,
        &placeholders,
    )
}
