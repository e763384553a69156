use std::path::Path;

use colored::Colorize;

use crate::error::Result;
use crate::settings::{MailboxConfig, Settings};

pub fn run(settings: &Settings, source: &Path, mailbox: Option<&str>) -> Result<()> {
    println!("{} {}", "Settings:".bold(), source.display());
    println!("{} {}", "Data dir:".bold(), settings.data_dir().display());
    println!("{} {}", "Log:".bold(), settings.log_path().display());

    match mailbox {
        Some(name) => print_mailbox(settings, name, settings.mailbox(name)?),
        None if settings.mailboxes.is_empty() => println!("No mailboxes configured."),
        None => {
            for (name, mb) in &settings.mailboxes {
                print_mailbox(settings, name, mb);
            }
        }
    }
    Ok(())
}

fn print_mailbox(settings: &Settings, name: &str, mb: &MailboxConfig) {
    println!();
    println!("{}", name.green().bold());
    println!("  url:       {}", mb.url);
    println!("  login:     {}", mb.login);
    println!("  password:  {}", mb.password);
    println!("  cache:     {}", settings.cache_dir(name).display());
    if let Some(since) = &mb.summary_since {
        println!("  since:     {since}");
    }
    println!("  small:     {:.2}", mb.small_threshold);
    for f in &mb.purge {
        println!("  purge:     {:>4}d  {}", f.days_before, f.expression);
    }
    for f in &mb.summarize {
        println!("  summarize: {:>4}d  {}", f.days_before, f.expression);
    }
}
