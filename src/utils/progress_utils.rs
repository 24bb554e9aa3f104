use indicatif::{ProgressBar, ProgressStyle};

/// `None` if the bar style cannot be built
pub fn progress_bar(len: u64, msg: String) -> Option<ProgressBar> {
    let style = ProgressStyle::default_bar()
        .template("[{elapsed_precise} / {eta_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
        .ok()?
        .progress_chars("##-");

    Some(ProgressBar::new(len).with_style(style).with_message(msg))
}
