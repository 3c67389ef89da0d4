use anyhow::Error;

use container_backup::backup_opts::BackupOpts;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Error> {
    BackupOpts::process_args().await
}
