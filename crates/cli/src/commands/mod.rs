pub mod config;
pub mod doctor;
pub mod replay;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}
