//! Line commands for the interactive studio session.

use crate::error::{Result, StudioError};
use crate::image::AspectRatio;
use std::path::PathBuf;

/// Help text listing the session commands.
pub const HELP: &str = "\
Type a prompt to describe the image you want to create or edit.

  :attach <path>...   attach PNG, JPG or WEBP images (switches to editing);
                      quote paths that contain spaces
  :remove <n>         remove attachment n (1-based)
  :clear              remove all attachments
  :count <1-4>        number of images to generate
  :ratio <ratio>      aspect ratio: 1:1, 16:9, 9:16, 4:3, 3:4
  :submit, :go        generate or edit
  :save [dir]         download the current results
  :status             show the form and results
  :help               show this help
  :quit               leave the studio";

/// One line of input to the interactive session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Replace the prompt.
    Prompt(String),
    /// Attach image files.
    Attach(Vec<PathBuf>),
    /// Remove an attachment by 1-based position.
    Remove(usize),
    /// Remove every attachment.
    ClearAttachments,
    /// Set the number of images to generate.
    Count(u8),
    /// Set the aspect ratio.
    Ratio(AspectRatio),
    /// Generate or edit with the current form.
    Submit,
    /// Download results, optionally into a given directory.
    Save(Option<PathBuf>),
    /// Show the form and results.
    Status,
    /// Show the command list.
    Help,
    /// Leave the session.
    Quit,
}

impl Command {
    /// Parses one input line. Blank lines yield `None`.
    ///
    /// Plain text becomes the prompt as typed. Command arguments are split on
    /// whitespace; wrap an argument in single or double quotes to keep its
    /// spaces.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        if line.trim().is_empty() {
            return Ok(None);
        }
        let Some(rest) = line.trim_start().strip_prefix(':') else {
            return Ok(Some(Self::Prompt(line.to_string())));
        };

        let mut words = split_args(rest)?.into_iter();
        let name = words.next().unwrap_or_default();
        let args: Vec<String> = words.collect();

        let command = match name.as_str() {
            "attach" | "a" => {
                if args.is_empty() {
                    return Err(usage(":attach <path>..."));
                }
                Self::Attach(args.into_iter().map(PathBuf::from).collect())
            }
            "remove" | "rm" => {
                let n = single_arg(&args, ":remove <n>")?
                    .parse::<usize>()
                    .ok()
                    .filter(|n| *n >= 1)
                    .ok_or_else(|| usage(":remove <n> (n starts at 1)"))?;
                Self::Remove(n)
            }
            "clear" => Self::ClearAttachments,
            "count" | "n" => {
                let n = single_arg(&args, ":count <1-4>")?
                    .parse::<u8>()
                    .map_err(|_| usage(":count <1-4>"))?;
                Self::Count(n)
            }
            "ratio" | "r" => Self::Ratio(single_arg(&args, ":ratio <ratio>")?.parse()?),
            "submit" | "go" => Self::Submit,
            "save" => Self::Save(args.into_iter().next().map(PathBuf::from)),
            "status" | "s" => Self::Status,
            "help" | "h" | "?" => Self::Help,
            "quit" | "q" | "exit" => Self::Quit,
            other => {
                return Err(StudioError::InvalidRequest(format!(
                    "unknown command ':{other}'. Type :help for a list."
                )))
            }
        };
        Ok(Some(command))
    }
}

/// Splits on whitespace, keeping quoted runs together.
fn split_args(input: &str) -> Result<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote = None;

    for c in input.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    args.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quote.is_some() {
        return Err(StudioError::InvalidRequest("unclosed quote".into()));
    }
    if in_word {
        args.push(current);
    }
    Ok(args)
}

fn single_arg<'a>(args: &'a [String], usage_text: &str) -> Result<&'a str> {
    match args {
        [one] => Ok(one.as_str()),
        _ => Err(usage(usage_text)),
    }
}

fn usage(text: &str) -> StudioError {
    StudioError::InvalidRequest(format!("usage: {text}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_prompt() {
        assert_eq!(
            Command::parse("  a cat wearing a hat ").unwrap(),
            Some(Command::Prompt("  a cat wearing a hat ".into()))
        );
        assert_eq!(Command::parse("   ").unwrap(), None);
        assert_eq!(Command::parse("  :go").unwrap(), Some(Command::Submit));
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse(":attach a.png b.jpg").unwrap(),
            Some(Command::Attach(vec!["a.png".into(), "b.jpg".into()]))
        );
        assert_eq!(Command::parse(":rm 2").unwrap(), Some(Command::Remove(2)));
        assert_eq!(Command::parse(":count 4").unwrap(), Some(Command::Count(4)));
        assert_eq!(
            Command::parse(":ratio 9:16").unwrap(),
            Some(Command::Ratio(AspectRatio::Portrait))
        );
        assert_eq!(Command::parse(":go").unwrap(), Some(Command::Submit));
        assert_eq!(Command::parse(":save").unwrap(), Some(Command::Save(None)));
        assert_eq!(
            Command::parse(":save out").unwrap(),
            Some(Command::Save(Some("out".into())))
        );
        assert_eq!(Command::parse(":q").unwrap(), Some(Command::Quit));
    }

    #[test]
    fn test_quoted_paths_keep_spaces() {
        assert_eq!(
            Command::parse(r#":attach "my photos/cat 1.png" 'dog 2.jpg' plain.webp"#).unwrap(),
            Some(Command::Attach(vec![
                "my photos/cat 1.png".into(),
                "dog 2.jpg".into(),
                "plain.webp".into(),
            ]))
        );
        assert_eq!(
            Command::parse(r#":save "out dir""#).unwrap(),
            Some(Command::Save(Some("out dir".into())))
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(Command::parse(":attach").is_err());
        assert!(Command::parse(":remove 0").is_err());
        assert!(Command::parse(":remove x").is_err());
        assert!(Command::parse(":count").is_err());
        assert!(Command::parse(":ratio 21:9").is_err());
        assert!(Command::parse(":frobnicate").is_err());
        assert!(Command::parse(":attach \"unterminated.png").is_err());
    }
}
