/// Subject and bodies of the login-code email.
pub struct CodeEmail {
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl CodeEmail {
    pub fn new(code: &str, valid_minutes: i64) -> Self {
        Self {
            subject: "Your Resume Tailor login code".to_string(),
            text: format!(
                "Your login code is: {code}\n\n\
                 It expires in {valid_minutes} minutes.\n\n\
                 If you did not request this code, you can ignore this email."
            ),
            html: format!(
                r#"<!DOCTYPE html>
<html>
<body style="font-family: sans-serif; color: #222;">
    <h2>Your login code</h2>
    <p style="font-size: 28px; letter-spacing: 6px; font-weight: bold; color: #1d4ed8;">{code}</p>
    <p>It expires in {valid_minutes} minutes.</p>
    <p style="color: #777; font-size: 12px;">If you did not request this code, you can ignore this email.</p>
</body>
</html>"#
            ),
        }
    }
}
