//! Canonical folder and file names for one item.
//!
//! Templates are plain strings with `{placeholder}` fields and `[ ... ]`
//! optional groups. A group renders only when every placeholder inside it is
//! non-empty, which is how standalone items lose their series segment.

use crate::config::{NamingConfig, StandaloneRule};
use crate::error::{TidyError, TidyResult};
use crate::metadata::ItemMetadata;
use crate::utils::{self, PLACEHOLDER_NAME};
use std::path::PathBuf;

/// Which template is being parsed; `{track}` only makes sense for files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Folder,
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Author,
    Authors,
    Narrator,
    Series,
    Sequence,
    Title,
    Track,
}

impl Field {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "author" => Some(Field::Author),
            "authors" => Some(Field::Authors),
            "narrator" => Some(Field::Narrator),
            "series" => Some(Field::Series),
            "sequence" => Some(Field::Sequence),
            "title" => Some(Field::Title),
            "track" => Some(Field::Track),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Field),
    Optional(Vec<Segment>),
}

/// A parsed naming template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(text: &str, kind: TemplateKind) -> TidyResult<Self> {
        let err = |msg: String| TidyError::ConfigError(format!("template `{}`: {}", text, msg));

        let mut top: Vec<Segment> = Vec::new();
        let mut group: Option<Vec<Segment>> = None;
        let mut literal = String::new();
        let mut chars = text.chars();

        fn flush(literal: &mut String, top: &mut Vec<Segment>, group: &mut Option<Vec<Segment>>) {
            if literal.is_empty() {
                return;
            }
            let seg = Segment::Literal(std::mem::take(literal));
            match group {
                Some(g) => g.push(seg),
                None => top.push(seg),
            }
        }

        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    flush(&mut literal, &mut top, &mut group);
                    let mut name = String::new();
                    let mut closed = false;
                    for n in chars.by_ref() {
                        if n == '}' {
                            closed = true;
                            break;
                        }
                        name.push(n);
                    }
                    if !closed {
                        return Err(err("unclosed `{`".to_string()));
                    }
                    let field = Field::from_name(name.trim())
                        .ok_or_else(|| err(format!("unknown placeholder `{{{}}}`", name)))?;
                    if field == Field::Track && kind == TemplateKind::Folder {
                        return Err(err("{track} is only valid in file templates".to_string()));
                    }
                    let seg = Segment::Field(field);
                    match group.as_mut() {
                        Some(g) => g.push(seg),
                        None => top.push(seg),
                    }
                }
                '}' => return Err(err("unmatched `}`".to_string())),
                '[' => {
                    if group.is_some() {
                        return Err(err("optional groups cannot be nested".to_string()));
                    }
                    flush(&mut literal, &mut top, &mut group);
                    group = Some(Vec::new());
                }
                ']' => {
                    flush(&mut literal, &mut top, &mut group);
                    match group.take() {
                        Some(g) => top.push(Segment::Optional(g)),
                        None => return Err(err("unmatched `]`".to_string())),
                    }
                }
                _ => literal.push(c),
            }
        }
        if group.is_some() {
            return Err(err("unclosed `[`".to_string()));
        }
        flush(&mut literal, &mut top, &mut group);

        let template = Template { segments: top };
        match kind {
            TemplateKind::File => {
                if !template.contains(Field::Track) {
                    return Err(err("file template must contain {track}".to_string()));
                }
                if text.contains('/') || text.contains('\\') {
                    return Err(err("file template must not contain path separators".to_string()));
                }
            }
            TemplateKind::Folder => {
                if template.segments.is_empty() {
                    return Err(err("folder template is empty".to_string()));
                }
            }
        }
        Ok(template)
    }

    fn contains(&self, field: Field) -> bool {
        fn walk(segments: &[Segment], field: Field) -> bool {
            segments.iter().any(|s| match s {
                Segment::Field(f) => *f == field,
                Segment::Optional(inner) => walk(inner, field),
                Segment::Literal(_) => false,
            })
        }
        walk(&self.segments, field)
    }

    /// Render with already-sanitized field values
    pub fn render(&self, values: &FieldValues) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(field) => out.push_str(values.get(*field)),
                Segment::Optional(inner) => {
                    let complete = inner.iter().all(|s| match s {
                        Segment::Field(f) => !values.get(*f).is_empty(),
                        _ => true,
                    });
                    if complete {
                        for s in inner {
                            match s {
                                Segment::Literal(text) => out.push_str(text),
                                Segment::Field(f) => out.push_str(values.get(*f)),
                                Segment::Optional(_) => {}
                            }
                        }
                    }
                }
            }
        }
        out
    }
}

/// Sanitized values substituted into templates; empty means absent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldValues {
    pub author: String,
    pub authors: String,
    pub narrator: String,
    pub series: String,
    pub sequence: String,
    pub title: String,
    pub track: String,
}

impl FieldValues {
    fn get(&self, field: Field) -> &str {
        match field {
            Field::Author => &self.author,
            Field::Authors => &self.authors,
            Field::Narrator => &self.narrator,
            Field::Series => &self.series,
            Field::Sequence => &self.sequence,
            Field::Title => &self.title,
            Field::Track => &self.track,
        }
    }
}

/// Canonical layout of one item
#[derive(Debug)]
pub struct CanonicalNames {
    /// Folder path relative to the library root
    pub folder: PathBuf,
    /// One name per media file, in the order the files were given
    pub files: Vec<String>,
    /// Degenerate names that fell back to the placeholder
    pub warnings: Vec<TidyError>,
}

/// Zero-pad the integer part of a numeric sequence; other text is kept verbatim
pub fn pad_sequence(sequence: &str, width: usize) -> String {
    let sequence = sequence.trim();
    let (int_part, frac_part) = match sequence.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (sequence, None),
    };
    let numeric = !int_part.is_empty()
        && int_part.chars().all(|c| c.is_ascii_digit())
        && frac_part.map_or(true, |f| !f.is_empty() && f.chars().all(|c| c.is_ascii_digit()));
    if !numeric {
        return sequence.to_string();
    }

    let trimmed = int_part.trim_start_matches('0');
    let int_part = if trimmed.is_empty() { "0" } else { trimmed };
    match frac_part {
        Some(frac) => format!("{:0>width$}.{}", int_part, frac, width = width),
        None => format!("{:0>width$}", int_part, width = width),
    }
}

/// Derive the canonical folder and media file names for an item.
///
/// `media_files` are the item's current media file names in track order; the
/// returned file names keep each file's extension and position.
pub fn format_names(
    meta: &ItemMetadata,
    media_files: &[String],
    naming: &NamingConfig,
) -> TidyResult<CanonicalNames> {
    let folder_template = Template::parse(&naming.folder_template, TemplateKind::Folder)?;
    let file_template = Template::parse(&naming.file_template, TemplateKind::File)?;

    let mut warnings = Vec::new();
    let mut values = field_values(meta, naming, &mut warnings);

    let mut folder = PathBuf::new();
    for (idx, raw) in folder_template.render(&values).split('/').enumerate() {
        let component = utils::clamp_component(&utils::sanitize(raw, naming), naming.max_name_length);
        if component.is_empty() {
            warnings.push(TidyError::NameFormattingFailure {
                what: format!("folder component {} of `{}`", idx + 1, meta.title),
                placeholder: PLACEHOLDER_NAME.to_string(),
            });
            folder.push(PLACEHOLDER_NAME);
        } else {
            folder.push(component);
        }
    }

    let width = naming.track_padding.max(media_files.len().to_string().len());
    let mut files = Vec::with_capacity(media_files.len());
    for (idx, original) in media_files.iter().enumerate() {
        values.track = format!("{:0width$}", idx + 1, width = width);
        let (_, ext) = utils::split_extension(original);
        let limit = naming.max_name_length.saturating_sub(ext.len()).max(1);
        let stem = fit_stem(&file_template, &values, naming, limit);
        if stem.is_empty() {
            warnings.push(TidyError::NameFormattingFailure {
                what: format!("file `{}`", original),
                placeholder: PLACEHOLDER_NAME.to_string(),
            });
            files.push(format!("{} - {}{}", PLACEHOLDER_NAME, values.track, ext));
        } else {
            files.push(format!("{}{}", stem, ext));
        }
    }

    Ok(CanonicalNames {
        folder,
        files,
        warnings,
    })
}

/// Render a file stem within `limit` bytes, shortening the title first so the
/// track number survives
fn fit_stem(template: &Template, values: &FieldValues, naming: &NamingConfig, limit: usize) -> String {
    let stem = utils::sanitize(&template.render(values), naming);
    if stem.len() <= limit {
        return stem;
    }

    let excess = stem.len() - limit;
    let mut shortened = values.clone();
    let keep = values.title.len().saturating_sub(excess);
    shortened.title = utils::clamp_component(&values.title, keep);
    let stem = utils::sanitize(&template.render(&shortened), naming);
    utils::clamp_component(&stem, limit)
}

fn field_values(
    meta: &ItemMetadata,
    naming: &NamingConfig,
    warnings: &mut Vec<TidyError>,
) -> FieldValues {
    let mut clean = |label: &str, raw: &str| -> String {
        let value = utils::clamp_component(&utils::sanitize(raw, naming), naming.max_name_length);
        if value.is_empty() && !raw.trim().is_empty() {
            warnings.push(TidyError::NameFormattingFailure {
                what: format!("{} `{}`", label, raw),
                placeholder: PLACEHOLDER_NAME.to_string(),
            });
            return PLACEHOLDER_NAME.to_string();
        }
        value
    };

    let author = clean("author", meta.primary_author());
    let authors = if meta.authors.len() <= 1 {
        author.clone()
    } else {
        clean("authors", &meta.authors.join(", "))
    };
    let narrator = clean("narrator", meta.narrators.first().map(String::as_str).unwrap_or(""));
    let title = clean("title", &meta.title);

    let (series, sequence) = match &meta.series {
        Some(series) => {
            let sequence = series
                .sequence
                .as_deref()
                .map(|s| pad_sequence(s, naming.sequence_padding));
            let standalone = naming.standalone_rule == StandaloneRule::SeriesAndSequence
                && sequence.is_none();
            if standalone {
                (String::new(), String::new())
            } else {
                (
                    clean("series", &series.name),
                    clean("sequence", sequence.as_deref().unwrap_or("")),
                )
            }
        }
        None => (String::new(), String::new()),
    };

    FieldValues {
        author,
        authors,
        narrator,
        series,
        sequence,
        title: if title.is_empty() { PLACEHOLDER_NAME.to_string() } else { title },
        track: String::new(),
    }
}
