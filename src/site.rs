//! Static site generation.
//!
//! Produces one `index.html` per configured section, a blog listing and
//! a page per post, all wrapped in the shared layout template.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use futures_util::future::try_join_all;
use serde::Serialize;
use tera::{Context, Tera};
use tokio::sync::Mutex;

use crate::config::{SectionConfig, SiteConfig};
use crate::model::network::Post;
use crate::page::{post_dir, post_path, ContentWarning, Page};

const BLOG_KEY: &str = "blog";

#[derive(thiserror::Error, Debug)]
pub enum SiteError {
    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error("invalid page url: {0}")]
    Url(#[from] url::ParseError),

    #[error("could not access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("section '{0}' needs site.content_dir to be set")]
    NoContentDir(String),
}

#[derive(Serialize)]
struct NavLink<'a> {
    label: &'a str,
    href: String,
    active: bool,
}

#[derive(Serialize)]
struct ListItem {
    title: String,
    description: String,
    href: String,
    date: String,
}

#[derive(Debug)]
pub struct BuildReport {
    pub pages: usize,
    /// Post slug and what was wrong with its content.
    pub warnings: Vec<(String, ContentWarning)>,
}

pub struct Site {
    config: SiteConfig,
    tera: Tera,
    building: Mutex<()>,
}

impl Site {
    pub fn new(config: SiteConfig) -> Result<Self, SiteError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("layout.html", include_str!("../templates/layout.html")),
            ("section.html", include_str!("../templates/section.html")),
            ("blog.html", include_str!("../templates/blog.html")),
            ("post.html", include_str!("../templates/post.html")),
        ])?;

        Ok(Self {
            config,
            tera,
            building: Mutex::new(()),
        })
    }

    pub fn out_dir(&self) -> &Path {
        &self.config.out_dir
    }

    /// Configured sections, with the blog appended unless listed.
    fn sections(&self) -> Vec<SectionConfig> {
        let mut sections = self.config.sections.clone();
        if !sections.iter().any(|section| section.key == BLOG_KEY) {
            sections.push(SectionConfig {
                label: "Blog".to_string(),
                key: BLOG_KEY.to_string(),
                index: false,
            });
        }
        sections
    }

    /// URL path prefix of the site, always ending in `/`.
    fn root(&self) -> String {
        let path = self.config.base_url.path();
        if path.ends_with('/') {
            path.to_string()
        } else {
            format!("{}/", path)
        }
    }

    fn context(
        &self,
        sections: &[SectionConfig],
        active: &str,
        label: &str,
        path: &str,
    ) -> Result<Context, SiteError> {
        let root = self.root();
        let nav: Vec<_> = sections
            .iter()
            .map(|section| NavLink {
                label: &section.label,
                href: format!("{}{}/", root, section.key),
                active: section.key == active,
            })
            .collect();

        let mut context = Context::new();
        context.insert("site_title", &self.config.title);
        context.insert("label", label);
        context.insert("root", &root);
        context.insert("path", path);
        context.insert("canonical", self.config.base_url.join(path)?.as_str());
        context.insert("nav", &nav);
        Ok(context)
    }

    /// Renders every page and replaces the published tree.
    pub async fn build(&self, posts: &[Post]) -> Result<BuildReport, SiteError> {
        let _guard = self.building.lock().await;

        let sections = self.sections();
        let out_dir = &self.config.out_dir;
        let blog_href = format!("{}{}/", self.root(), BLOG_KEY);

        let mut rendered: Vec<(PathBuf, String)> = Vec::new();
        let mut warnings = Vec::new();

        // first post to claim a directory keeps it
        let mut known = HashSet::new();
        let mut published = Vec::with_capacity(posts.len());
        for post in posts {
            let dir = post_dir(post);
            if known.contains(&dir) {
                let warning = ContentWarning::DuplicateOutputPath(dir);
                warnings.push((post.draft.slug.clone(), warning));
            } else {
                known.insert(dir);
                published.push(post);
            }
        }

        let mut items = Vec::with_capacity(published.len());
        for post in published {
            let (page, page_warnings) = Page::render(post, &blog_href);

            let slug = &post.draft.slug;
            warnings.extend(page_warnings.into_iter().map(|warning| (slug.clone(), warning)));
            for linked in &page.linked_slugs {
                if !known.contains(&post_path(linked)) {
                    warnings.push((slug.clone(), ContentWarning::UnknownSlug(linked.clone())));
                }
            }

            let date = page.created.date().to_string();
            let path = format!("{}/{}/", BLOG_KEY, page.slug);
            let mut context = self.context(&sections, BLOG_KEY, &page.title, &path)?;
            context.insert("date", &date);
            context.insert("page", &page);

            rendered.push((
                out_dir.join(BLOG_KEY).join(&page.slug).join("index.html"),
                self.tera.render("post.html", &context)?,
            ));
            items.push(ListItem {
                href: format!("{}{}/", blog_href, page.slug),
                title: page.title,
                description: page.description,
                date,
            });
        }

        for section in &sections {
            let path = format!("{}/", section.key);

            let html = if section.key == BLOG_KEY {
                let mut context = self.context(&sections, BLOG_KEY, &section.label, &path)?;
                context.insert("posts", &items);
                self.tera.render("blog.html", &context)?
            } else {
                let fragment = self.fragment(&section.key).await?;
                let mut context = self.context(&sections, &section.key, &section.label, &path)?;
                context.insert("fragment", &fragment);
                self.tera.render("section.html", &context)?
            };

            if section.index {
                rendered.push((out_dir.join("index.html"), html.clone()));
            }
            rendered.push((out_dir.join(&section.key).join("index.html"), html));
        }

        // deleted posts must not linger
        let blog_dir = out_dir.join(BLOG_KEY);
        match tokio::fs::remove_dir_all(&blog_dir).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(SiteError::Io {
                    path: blog_dir,
                    source,
                })
            }
        }

        try_join_all(rendered.iter().map(|(path, html)| write_file(path, html))).await?;

        for (slug, warning) in &warnings {
            tracing::warn!(slug, ?warning, "content warning");
        }
        tracing::info!(pages = rendered.len(), out_dir = %out_dir.display(), "built site");

        Ok(BuildReport {
            pages: rendered.len(),
            warnings,
        })
    }

    async fn fragment(&self, key: &str) -> Result<String, SiteError> {
        let content_dir = self
            .config
            .content_dir
            .as_deref()
            .ok_or_else(|| SiteError::NoContentDir(key.to_string()))?;

        let path = content_dir.join(key).join(format!("{}.html", key));
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| SiteError::Io { path, source })
    }
}

async fn write_file(path: &Path, contents: &str) -> Result<(), SiteError> {
    let io_error = |source| SiteError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await.map_err(io_error)?;
    }
    tokio::fs::write(path, contents).await.map_err(io_error)
}
