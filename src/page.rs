use indexmap::{IndexMap, IndexSet};
use pulldown_cmark::{BrokenLink, CowStr, Event, LinkType, Options, Parser, Tag, TagEnd};
use serde::Serialize;
use time::OffsetDateTime;

use crate::model::network::{Post, Timestamp};

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(transparent)]
pub struct Html(pub String);

#[derive(Serialize, Clone, Debug)]
pub struct Page {
    pub id: String,
    /// Path segment of the published page.
    pub slug: String,
    pub title: String,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub modified: OffsetDateTime,
    pub content: Html,
    pub linked_slugs: Vec<String>,
    pub footnotes: IndexMap<String, Html>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub enum ContentWarning {
    UnknownFootnote(String),
    UnreferencedFootnote(String),
    UnknownLink(String),
    UnknownSlug(String),
    InvalidTimestamp(String),
    /// Another post already publishes to this directory.
    DuplicateOutputPath(String),
}

/// Directory name a slug is published under.
pub fn post_path(slug: &str) -> String {
    slug::slugify(slug)
}

/// Directory name a post is published under. Slugs with nothing left
/// after slugifying fall back to the post id.
pub fn post_dir(post: &Post) -> String {
    match post_path(&post.draft.slug) {
        dir if dir.is_empty() => post_path(&post.id),
        dir => dir,
    }
}

fn to_datetime(
    field: &str,
    timestamp: &Timestamp,
    warnings: &mut Vec<ContentWarning>,
) -> OffsetDateTime {
    let parsed = timestamp.millis().and_then(|millis| {
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
    });

    parsed.unwrap_or_else(|| {
        warnings.push(ContentWarning::InvalidTimestamp(field.to_string()));
        OffsetDateTime::UNIX_EPOCH
    })
}

impl Page {
    /// Renders a post's markdown. Links to `@slug` become links to the
    /// published post under `blog_href`.
    pub fn render(post: &Post, blog_href: &str) -> (Page, Vec<ContentWarning>) {
        let mut errors = Vec::new();

        let mut content = String::new();
        let mut linked_slugs = Vec::new();

        let mut footnote_references = IndexSet::new();
        let mut in_footnotes = Vec::new();
        let mut footnote_events = IndexMap::new();

        let parser = Parser::new_with_broken_link_callback(
            &post.draft.content,
            Options::all(),
            Some(|BrokenLink { reference, .. }| Some((reference, CowStr::Borrowed("")))),
        )
        .map(|event| match event {
            Event::Start(Tag::Link {
                link_type,
                dest_url,
                title,
                id,
            }) => {
                let dest_url = match dest_url.strip_prefix('@').map(str::to_string) {
                    Some(slug) => {
                        let href = format!("{}{}/", blog_href, post_path(&slug));
                        linked_slugs.push(slug);
                        CowStr::from(href)
                    }
                    None => {
                        if matches!(
                            link_type,
                            LinkType::CollapsedUnknown
                                | LinkType::ReferenceUnknown
                                | LinkType::ShortcutUnknown
                        ) {
                            errors.push(ContentWarning::UnknownLink(dest_url.to_string()));
                        }
                        dest_url
                    }
                };

                Event::Start(Tag::Link {
                    link_type,
                    dest_url,
                    title,
                    id,
                })
            }

            Event::FootnoteReference(ref name) => {
                footnote_references.insert(name.to_string());
                event
            }

            _ => event,
        })
        .filter_map(|event| match event {
            Event::Start(Tag::FootnoteDefinition(ref name)) => {
                in_footnotes.push((name.to_string(), vec![event]));
                None
            }

            Event::End(TagEnd::FootnoteDefinition) => {
                if let Some((name, mut footnote)) = in_footnotes.pop() {
                    footnote.push(event);
                    footnote_events.insert(name, footnote);
                }
                None
            }

            _ => match in_footnotes.last_mut() {
                Some((_, footnote)) => {
                    footnote.push(event);
                    None
                }
                None => Some(event),
            },
        });

        pulldown_cmark::html::push_html(&mut content, parser);

        let mut footnotes = IndexMap::new();
        for reference in footnote_references {
            let Some(events) = footnote_events.shift_remove(&reference) else {
                errors.push(ContentWarning::UnknownFootnote(reference));
                continue;
            };

            // already collected links from footnote markdown
            let mut footnote_html = String::new();
            pulldown_cmark::html::push_html(&mut footnote_html, events.into_iter());
            footnotes.insert(reference, Html(footnote_html));
        }

        for (name, events) in footnote_events {
            errors.push(ContentWarning::UnreferencedFootnote(name.clone()));

            let mut footnote_html = String::new();
            pulldown_cmark::html::push_html(&mut footnote_html, events.into_iter());
            footnotes.insert(name, Html(footnote_html));
        }

        let created = to_datetime("dateCreated", &post.draft.date_created, &mut errors);
        let modified = to_datetime("dateModified", &post.draft.date_modified, &mut errors);

        let page = Page {
            id: post.id.clone(),
            slug: post_dir(post),
            title: post.draft.title.clone(),
            description: post.draft.description.clone(),
            created,
            modified,
            content: Html(content),
            linked_slugs,
            footnotes,
        };

        (page, errors)
    }
}
