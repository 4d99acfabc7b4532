#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_maxage: i64,
    pub otp_expires_minutes: i64,
    pub otp_resend_cooldown_seconds: i64,
    pub port: u16,
    pub frontend_url: String,
    pub smtp_username: String,
    pub smtp_password: String,
    pub smtp_server: String,
    pub smtp_port: u16,
}

impl Config {
    pub fn init() -> Config {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let jwt_secret = std::env::var("JWT_SECRET_KEY").expect("JWT_SECRET_KEY must be set");
        // Session tokens default to 7 days.
        let jwt_maxage = std::env::var("JWT_MAXAGE").unwrap_or_else(|_| "604800".to_string());
        let otp_expires_minutes =
            std::env::var("OTP_EXPIRES_MINUTES").unwrap_or_else(|_| "5".to_string());
        let otp_resend_cooldown_seconds =
            std::env::var("OTP_RESEND_COOLDOWN_SECONDS").unwrap_or_else(|_| "60".to_string());
        let port = std::env::var("PORT").unwrap_or_else(|_| "8000".to_string());
        let frontend_url = std::env::var("FRONTEND_URL").expect("FRONTEND_URL must be set");
        let smtp_username = std::env::var("SMTP_USERNAME").expect("SMTP_USERNAME must be set");
        let smtp_password = std::env::var("SMTP_PASSWORD").expect("SMTP_PASSWORD must be set");
        let smtp_server = std::env::var("SMTP_SERVER").expect("SMTP_SERVER must be set");
        let smtp_port = std::env::var("SMTP_PORT").unwrap_or_else(|_| "587".to_string());

        Config {
            database_url,
            jwt_secret,
            jwt_maxage: jwt_maxage.parse::<i64>().unwrap(),
            otp_expires_minutes: otp_expires_minutes.parse::<i64>().unwrap(),
            otp_resend_cooldown_seconds: otp_resend_cooldown_seconds.parse::<i64>().unwrap(),
            port: port.parse::<u16>().unwrap(),
            frontend_url,
            smtp_username,
            smtp_password,
            smtp_server,
            smtp_port: smtp_port.parse::<u16>().unwrap(),
        }
    }
}
