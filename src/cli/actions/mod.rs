use std::path::PathBuf;

pub mod server;

#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        data_dir: PathBuf,
        log_dir: Option<PathBuf>,
        allow_origin: Vec<String>,
        block_origin: Vec<String>,
        token_timeout: i64,
        recycling_span: i64,
    },
}
