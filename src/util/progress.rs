//! Progress bars for long transfers.

use indicatif::{ProgressBar, ProgressStyle};

const BYTES_TEMPLATE: &str = "{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes}";
const ITEMS_TEMPLATE: &str = "{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len}";

/// A progress bar for a transfer of `total` bytes, or a spinner if the size
/// is unknown.
pub fn transfer_bar(total: Option<u64>, message: impl Into<String>) -> ProgressBar {
    let pb = match total {
        Some(total) => styled(ProgressBar::new(total), BYTES_TEMPLATE),
        None => ProgressBar::new_spinner(),
    };
    pb.set_message(message.into());
    pb
}

/// A progress bar counting items, such as git objects.
pub fn items_bar(total: u64, message: impl Into<String>) -> ProgressBar {
    let pb = styled(ProgressBar::new(total), ITEMS_TEMPLATE);
    pb.set_message(message.into());
    pb
}

fn styled(pb: ProgressBar, template: &str) -> ProgressBar {
    match ProgressStyle::default_bar().template(template) {
        Ok(style) => pb.with_style(style.progress_chars("#>-")),
        Err(_) => pb,
    }
}
