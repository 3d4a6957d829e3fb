use askama::Template;

#[derive(Template)]
#[template(path = "email/backup_success.txt")]
pub struct BackupSuccessEmail<'a> {
    pub kind: &'a str,
    pub database: &'a str,
    pub filename: &'a str,
    pub size_human: String,
    pub tables: usize,
    pub finished_at: String,
    pub checksum: Option<&'a str>,
}

impl BackupSuccessEmail<'_> {
    pub const NAME: &'static str = "backup_success";
}

#[derive(Template)]
#[template(path = "email/backup_failure.txt")]
pub struct BackupFailureEmail<'a> {
    pub kind: &'a str,
    pub database: &'a str,
    pub error: &'a str,
    pub finished_at: String,
}

impl BackupFailureEmail<'_> {
    pub const NAME: &'static str = "backup_failure";
}

#[derive(Template)]
#[template(path = "email/contact_form.txt")]
pub struct ContactFormEmail<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub subject: &'a str,
    pub message: &'a str,
}

impl ContactFormEmail<'_> {
    pub const NAME: &'static str = "contact_form";
}
