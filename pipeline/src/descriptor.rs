//! Parser and renderer for module descriptor files.
//!
//! Descriptors are line-oriented text. A line starting with `[` opens a
//! named section (`[Files` opens the `Files` section) that runs until a line
//! containing only `]`. Outside sections, `key=value` lines are properties;
//! anything else (comments, blank lines, stray text) is kept verbatim.
//! Rendering an unmodified descriptor reproduces the input byte for byte,
//! including its line endings and trailing newline.

use thiserror::Error;

/// Property holding the module version.
pub const VERSION_KEY: &str = "Version";

/// Section listing the module's source and resource files.
pub const FILES_SECTION: &str = "Files";

/// Structural problems found in a descriptor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DescriptorError {
    /// A section was opened but never closed.
    #[error("section [{name} opened on line {line} is never closed")]
    UnterminatedSection {
        /// Section name.
        name: String,
        /// One-based line number of the opening bracket.
        line: usize,
    },

    /// A required `key=value` line is absent.
    #[error("missing {key}= line")]
    MissingProperty {
        /// Property key.
        key: String,
    },

    /// A required section is absent.
    #[error("missing [{name} section")]
    MissingSection {
        /// Section name.
        name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Property { key: String, value: String },
    Section { name: String, entries: Vec<String> },
    Text(String),
}

/// A parsed descriptor.
///
/// # Examples
///
/// ```
/// use relpipe::descriptor::Descriptor;
///
/// let text = "Version=1.0.20\n[Files\nsrc/Old.java\n]\n";
/// let mut descriptor = Descriptor::parse(text)?;
/// descriptor.set_property("Version", "1.0.21")?;
/// descriptor.replace_section("Files", vec!["src/New.java".to_owned()])?;
///
/// assert_eq!(descriptor.render(), "Version=1.0.21\n[Files\nsrc/New.java\n]\n");
/// # Ok::<(), relpipe::descriptor::DescriptorError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    lines: Vec<Line>,
    line_ending: &'static str,
    trailing_newline: bool,
}

impl Descriptor {
    /// Parse descriptor text.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::UnterminatedSection`] when a section has no
    /// closing `]` line.
    pub fn parse(text: &str) -> Result<Self, DescriptorError> {
        let line_ending = if text.contains("\r\n") { "\r\n" } else { "\n" };
        let trailing_newline = text.ends_with('\n');
        let body = text
            .strip_suffix(line_ending)
            .or_else(|| text.strip_suffix('\n'))
            .unwrap_or(text);

        let raw_lines: Vec<&str> = if body.is_empty() && !trailing_newline {
            Vec::new()
        } else {
            body.split('\n')
                .map(|line| line.strip_suffix('\r').unwrap_or(line))
                .collect()
        };

        let mut lines = Vec::new();
        let mut raw = raw_lines.into_iter().enumerate();

        while let Some((index, line)) = raw.next() {
            if let Some(name) = line.strip_prefix('[') {
                let name = name.trim().to_owned();
                let mut entries = Vec::new();
                let mut closed = false;
                for (_, entry) in raw.by_ref() {
                    if entry.trim() == "]" {
                        closed = true;
                        break;
                    }
                    entries.push(entry.to_owned());
                }
                if !closed {
                    return Err(DescriptorError::UnterminatedSection {
                        name,
                        line: index + 1,
                    });
                }
                lines.push(Line::Section { name, entries });
            } else if let Some((key, value)) = split_property(line) {
                lines.push(Line::Property {
                    key: key.to_owned(),
                    value: value.to_owned(),
                });
            } else {
                lines.push(Line::Text(line.to_owned()));
            }
        }

        Ok(Self {
            lines,
            line_ending,
            trailing_newline,
        })
    }

    /// Value of the first `key=` line, if present.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| match line {
            Line::Property { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    /// Replace the value of the first `key=` line, returning the old value.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::MissingProperty`] when no such line exists;
    /// properties are never appended.
    pub fn set_property(&mut self, key: &str, value: &str) -> Result<String, DescriptorError> {
        self.lines
            .iter_mut()
            .find_map(|line| match line {
                Line::Property { key: k, value: v } if k == key => {
                    Some(std::mem::replace(v, value.to_owned()))
                }
                _ => None,
            })
            .ok_or_else(|| DescriptorError::MissingProperty {
                key: key.to_owned(),
            })
    }

    /// Entries of the named section, if present.
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&[String]> {
        self.lines.iter().find_map(|line| match line {
            Line::Section { name: n, entries } if n == name => Some(entries.as_slice()),
            _ => None,
        })
    }

    /// Replace the entries of the named section.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::MissingSection`] when the section is absent.
    pub fn replace_section(
        &mut self,
        name: &str,
        new_entries: Vec<String>,
    ) -> Result<(), DescriptorError> {
        let entries = self
            .lines
            .iter_mut()
            .find_map(|line| match line {
                Line::Section { name: n, entries } if n == name => Some(entries),
                _ => None,
            })
            .ok_or_else(|| DescriptorError::MissingSection {
                name: name.to_owned(),
            })?;
        *entries = new_entries;
        Ok(())
    }

    /// Render the descriptor back to text.
    #[must_use]
    pub fn render(&self) -> String {
        let mut rendered: Vec<String> = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            match line {
                Line::Property { key, value } => rendered.push(format!("{key}={value}")),
                Line::Text(text) => rendered.push(text.clone()),
                Line::Section { name, entries } => {
                    rendered.push(format!("[{name}"));
                    rendered.extend(entries.iter().cloned());
                    rendered.push("]".to_owned());
                }
            }
        }

        let mut text = rendered.join(self.line_ending);
        if self.trailing_newline {
            text.push_str(self.line_ending);
        }
        text
    }
}

fn split_property(line: &str) -> Option<(&str, &str)> {
    if line.starts_with('#') {
        return None;
    }
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    (!key.is_empty() && !key.contains(char::is_whitespace)).then_some((key, value))
}
