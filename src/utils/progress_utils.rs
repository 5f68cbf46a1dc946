use indicatif::{ProgressBar, ProgressStyle};
use std::borrow::Cow;

pub fn progress_bar(len: u64, msg: impl Into<Cow<'static, str>>) -> ProgressBar {
    let bar = ProgressBar::new(len);
    if let Ok(style) =
        ProgressStyle::default_bar().template("[{elapsed_precise} / {eta_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
    {
        bar.set_style(style.progress_chars("##-"));
    }
    bar.set_message(msg);

    bar
}
