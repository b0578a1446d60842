mod cancellation;
mod file_history;
mod history_loading;
mod references;
