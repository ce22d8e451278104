//! Structural/semantic extraction of a single page.
//!
//! Parses the raw DOM once and pulls out everything the axis slicers and the
//! automated checker consume: headings, images, media, landmarks, forms,
//! links, language attributes, duplicate ids, ARIA references, and the
//! statically determinable style hints. All output types are plain
//! serializable data; no element handles escape this module.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;
use url::Url;

// ============================================================================
// EXTRACTED TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct HeadingEntry {
    pub level: i64,
    pub text: String,
    pub position: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageEntry {
    pub src: String,
    pub alt: Option<String>,
    pub role: Option<String>,
    pub aria_label: Option<String>,
    pub aria_describedby: Option<String>,
    pub is_decorative: bool,
    /// Trimmed text of the enclosing element, for alt-quality judgment.
    pub context: Option<String>,
    /// svg, img, object, icon-font or captcha marker.
    pub kind: ImageKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    Img,
    Svg,
    Object,
    IconFont,
    Captcha,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackEntry {
    pub kind: Option<String>,
    pub srclang: Option<String>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaEntry {
    pub kind: MediaKind,
    pub src: Option<String>,
    /// Recognized hosting provider for iframe embeds.
    pub provider: Option<String>,
    pub autoplay: bool,
    pub controls: bool,
    pub muted: bool,
    pub tracks: Vec<TrackEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    Audio,
    Embed,
}

#[derive(Debug, Clone, Serialize)]
pub struct LandmarkEntry {
    pub role: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldEntry {
    pub tag: String,
    pub input_type: Option<String>,
    pub id: Option<String>,
    pub name: Option<String>,
    /// Text of an associated label (for/id binding or wrapping label).
    pub label: Option<String>,
    pub aria_label: Option<String>,
    pub aria_labelledby: Option<String>,
    pub aria_describedby: Option<String>,
    pub placeholder: Option<String>,
    pub autocomplete: Option<String>,
    pub required: bool,
}

impl FieldEntry {
    pub fn is_labelled(&self) -> bool {
        self.label.is_some() || self.aria_label.is_some() || self.aria_labelledby.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FormEntry {
    pub fields: Vec<FieldEntry>,
    pub has_fieldset_legend: bool,
    pub has_submit: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkEntry {
    pub href: String,
    pub text: Option<String>,
    pub aria_label: Option<String>,
    pub is_internal: bool,
    pub position: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableEntry {
    pub has_headers: bool,
    pub has_caption: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ListStats {
    pub unordered: usize,
    pub ordered: usize,
    pub definition: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColorPair {
    pub color: Option<String>,
    pub background: Option<String>,
    pub element: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FontSizeEntry {
    pub value: f64,
    pub unit: String,
    pub relative: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LangSwitch {
    pub lang: String,
    pub sample: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InteractiveEntry {
    pub tag: String,
    pub role: Option<String>,
    pub tabindex: Option<i64>,
    pub has_click_handler: bool,
    pub accessible_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AriaRef {
    pub attr: String,
    pub target_id: String,
    pub resolved: bool,
}

/// Everything extracted from one page.
#[derive(Debug, Clone, Serialize)]
pub struct PageStructure {
    pub url: String,
    pub title: Option<String>,
    pub lang: Option<String>,
    pub headings: Vec<HeadingEntry>,
    pub images: Vec<ImageEntry>,
    pub media: Vec<MediaEntry>,
    pub landmarks: Vec<LandmarkEntry>,
    pub forms: Vec<FormEntry>,
    pub links: Vec<LinkEntry>,
    pub skip_links: Vec<LinkEntry>,
    pub nav_link_sets: Vec<Vec<String>>,
    pub tables: Vec<TableEntry>,
    pub lists: ListStats,
    pub duplicate_ids: Vec<String>,
    pub unresolved_aria_refs: Vec<AriaRef>,
    pub color_pairs: Vec<ColorPair>,
    pub font_sizes: Vec<FontSizeEntry>,
    pub language_switches: Vec<LangSwitch>,
    pub interactive: Vec<InteractiveEntry>,
    pub accesskeys: Vec<String>,
    pub aria_live_regions: usize,
    pub animation_hints: usize,
    pub meta_refresh: Option<String>,
    pub viewport_meta: Option<String>,
    pub word_count: i64,
}

// ============================================================================
// EXTRACTOR
// ============================================================================

pub struct PageExtractor;

macro_rules! selector {
    ($css:expr) => {{
        static SELECTOR: OnceLock<Selector> = OnceLock::new();
        SELECTOR.get_or_init(|| Selector::parse($css).unwrap())
    }};
}

impl PageExtractor {
    /// Parse the raw DOM and extract the full page structure. Synchronous on
    /// purpose: `Html` is not `Send`, so all parsing completes before any await.
    pub fn extract(html_str: &str, page_url: &str) -> PageStructure {
        let html = Html::parse_document(html_str);
        let doc_lang = Self::extract_lang(&html);
        let ids = Self::collect_ids(&html);

        PageStructure {
            url: page_url.to_string(),
            title: Self::extract_title(&html),
            lang: doc_lang.clone(),
            headings: Self::extract_headings(&html),
            images: Self::extract_images(&html, page_url),
            media: Self::extract_media(&html),
            landmarks: Self::extract_landmarks(&html),
            forms: Self::extract_forms(&html),
            links: Self::extract_links(&html, page_url),
            skip_links: Self::extract_skip_links(&html, page_url),
            nav_link_sets: Self::extract_nav_link_sets(&html),
            tables: Self::extract_tables(&html),
            lists: Self::extract_lists(&html),
            duplicate_ids: Self::duplicate_ids(&ids),
            unresolved_aria_refs: Self::unresolved_aria_refs(&html, &ids),
            color_pairs: Self::extract_color_pairs(&html),
            font_sizes: Self::extract_font_sizes(&html),
            language_switches: Self::extract_language_switches(&html, doc_lang.as_deref()),
            interactive: Self::extract_interactive(&html),
            accesskeys: Self::extract_accesskeys(&html),
            aria_live_regions: Self::count_aria_live(&html),
            animation_hints: Self::count_animation_hints(&html),
            meta_refresh: Self::extract_meta_refresh(&html),
            viewport_meta: Self::extract_viewport(&html),
            word_count: Self::extract_word_count(&html),
        }
    }

    pub fn extract_title(html: &Html) -> Option<String> {
        html.select(selector!("title"))
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn extract_lang(html: &Html) -> Option<String> {
        html.select(selector!("html"))
            .next()
            .and_then(|el| el.value().attr("lang"))
            .map(|s| s.trim().to_string())
    }

    pub fn extract_word_count(html: &Html) -> i64 {
        html.select(selector!("body"))
            .next()
            .map(|body| body.text().collect::<String>().split_whitespace().count() as i64)
            .unwrap_or(0)
    }

    pub fn extract_headings(html: &Html) -> Vec<HeadingEntry> {
        html.select(selector!("h1, h2, h3, h4, h5, h6"))
            .enumerate()
            .filter_map(|(idx, element)| {
                let level = element
                    .value()
                    .name()
                    .trim_start_matches('h')
                    .parse::<i64>()
                    .ok()?;
                Some(HeadingEntry {
                    level,
                    text: element.text().collect::<String>().trim().to_string(),
                    position: idx as i64,
                })
            })
            .collect()
    }

    pub fn extract_images(html: &Html, base_url: &str) -> Vec<ImageEntry> {
        let base = Url::parse(base_url).ok();
        let mut images = Vec::new();

        for element in html.select(selector!("img")) {
            let src = element.value().attr("src").unwrap_or("").trim().to_string();
            // An empty src stays empty so the automated checker can flag it.
            let resolved = if src.is_empty() {
                src
            } else {
                resolve(&base, &src)
            };
            let kind = if is_captcha_marker(&element, &resolved) {
                ImageKind::Captcha
            } else {
                ImageKind::Img
            };
            images.push(Self::image_entry(&element, resolved, kind));
        }

        for element in html.select(selector!("svg[role='img'], svg[aria-label]")) {
            images.push(Self::image_entry(&element, String::new(), ImageKind::Svg));
        }

        for element in html.select(selector!("object[data]")) {
            let data = element.value().attr("data").unwrap_or("").to_string();
            images.push(Self::image_entry(&element, resolve(&base, &data), ImageKind::Object));
        }

        // Icon fonts by class convention.
        for element in html.select(selector!("i[class], span[class]")) {
            let is_icon = element.value().classes().any(|c| {
                c.starts_with("icon-")
                    || c.starts_with("fa-")
                    || c == "fa"
                    || c == "material-icons"
                    || c == "glyphicon"
            });
            if is_icon {
                images.push(Self::image_entry(&element, String::new(), ImageKind::IconFont));
            }
        }

        images
    }

    fn image_entry(element: &ElementRef, src: String, kind: ImageKind) -> ImageEntry {
        let attr = |name: &str| element.value().attr(name).map(|s| s.trim().to_string());
        let alt = attr("alt");
        let role = attr("role");
        let is_decorative = alt.as_deref() == Some("")
            || role.as_deref() == Some("presentation")
            || role.as_deref() == Some("none")
            || element.value().attr("aria-hidden") == Some("true");

        ImageEntry {
            src,
            alt,
            role,
            aria_label: attr("aria-label"),
            aria_describedby: attr("aria-describedby"),
            is_decorative,
            context: surrounding_text(element),
            kind,
        }
    }

    pub fn extract_media(html: &Html) -> Vec<MediaEntry> {
        let mut media = Vec::new();

        for element in html.select(selector!("video, audio")) {
            let kind = if element.value().name() == "video" {
                MediaKind::Video
            } else {
                MediaKind::Audio
            };
            let tracks = element
                .select(selector!("track"))
                .map(|t| TrackEntry {
                    kind: t.value().attr("kind").map(str::to_string),
                    srclang: t.value().attr("srclang").map(str::to_string),
                    label: t.value().attr("label").map(str::to_string),
                })
                .collect();

            media.push(MediaEntry {
                kind,
                src: element
                    .value()
                    .attr("src")
                    .or_else(|| {
                        element
                            .select(selector!("source"))
                            .next()
                            .and_then(|s| s.value().attr("src"))
                    })
                    .map(str::to_string),
                provider: None,
                autoplay: element.value().attr("autoplay").is_some(),
                controls: element.value().attr("controls").is_some(),
                muted: element.value().attr("muted").is_some(),
                tracks,
            });
        }

        for element in html.select(selector!("iframe[src]")) {
            let src = element.value().attr("src").unwrap_or("");
            if let Some(provider) = embed_provider(src) {
                media.push(MediaEntry {
                    kind: MediaKind::Embed,
                    src: Some(src.to_string()),
                    provider: Some(provider.to_string()),
                    autoplay: src.contains("autoplay=1"),
                    controls: true,
                    muted: src.contains("mute=1") || src.contains("muted=1"),
                    tracks: Vec::new(),
                });
            }
        }

        media
    }

    pub fn extract_landmarks(html: &Html) -> Vec<LandmarkEntry> {
        let mut landmarks = Vec::new();

        for element in html.select(selector!("[role]")) {
            let role = element.value().attr("role").unwrap_or("");
            if matches!(
                role,
                "banner" | "navigation" | "main" | "contentinfo" | "complementary" | "search"
                    | "form" | "region"
            ) {
                landmarks.push(LandmarkEntry {
                    role: role.to_string(),
                    label: accessible_label(&element),
                });
            }
        }

        // Implicit landmark elements.
        for (css, role) in [
            ("header", "banner"),
            ("nav", "navigation"),
            ("main", "main"),
            ("footer", "contentinfo"),
            ("aside", "complementary"),
        ] {
            for element in html.select(selector_for_landmark(css)) {
                if element.value().attr("role").is_none() {
                    landmarks.push(LandmarkEntry {
                        role: role.to_string(),
                        label: accessible_label(&element),
                    });
                }
            }
        }

        landmarks
    }

    pub fn extract_forms(html: &Html) -> Vec<FormEntry> {
        let label_for = Self::label_for_map(html);

        html.select(selector!("form"))
            .map(|form| {
                let fields = form
                    .select(selector!("input, select, textarea"))
                    .filter(|f| {
                        !matches!(
                            f.value().attr("type"),
                            Some("hidden") | Some("submit") | Some("button") | Some("reset")
                        )
                    })
                    .map(|f| Self::field_entry(&f, &label_for))
                    .collect();

                FormEntry {
                    fields,
                    has_fieldset_legend: form.select(selector!("fieldset legend")).next().is_some(),
                    has_submit: form
                        .select(selector!(
                            "button[type='submit'], input[type='submit'], button:not([type])"
                        ))
                        .next()
                        .is_some(),
                }
            })
            .collect()
    }

    /// Map of control id -> label text from `label[for]` bindings.
    fn label_for_map(html: &Html) -> HashMap<String, String> {
        html.select(selector!("label[for]"))
            .filter_map(|label| {
                let target = label.value().attr("for")?.to_string();
                let text = label.text().collect::<String>().trim().to_string();
                (!text.is_empty()).then_some((target, text))
            })
            .collect()
    }

    fn field_entry(field: &ElementRef, label_for: &HashMap<String, String>) -> FieldEntry {
        let attr = |name: &str| field.value().attr(name).map(|s| s.trim().to_string());
        let id = attr("id");

        // for/id binding, then a wrapping <label>.
        let mut label = id.as_ref().and_then(|i| label_for.get(i).cloned());
        if label.is_none() {
            label = wrapping_label_text(field);
        }

        FieldEntry {
            tag: field.value().name().to_string(),
            input_type: attr("type"),
            id,
            name: attr("name"),
            label,
            aria_label: attr("aria-label"),
            aria_labelledby: attr("aria-labelledby"),
            aria_describedby: attr("aria-describedby"),
            placeholder: attr("placeholder"),
            autocomplete: attr("autocomplete"),
            required: field.value().attr("required").is_some()
                || field.value().attr("aria-required") == Some("true"),
        }
    }

    pub fn extract_links(html: &Html, base_url: &str) -> Vec<LinkEntry> {
        let base = Url::parse(base_url).ok();
        let base_host = base.as_ref().and_then(|u| u.host_str()).map(str::to_string);
        let base_port = base.as_ref().and_then(|u| u.port());

        html.select(selector!("a[href]"))
            .enumerate()
            .filter_map(|(idx, element)| {
                let href = element.value().attr("href")?.trim();
                if href.is_empty()
                    || href.starts_with("javascript:")
                    || href.starts_with("mailto:")
                    || href.starts_with("tel:")
                {
                    return None;
                }

                let resolved = if href.starts_with('#') {
                    href.to_string()
                } else {
                    resolve(&base, href)
                };

                let is_internal = if resolved.starts_with('#') {
                    true
                } else if let Ok(link_url) = Url::parse(&resolved) {
                    link_url.host_str().map(str::to_string) == base_host
                        && link_url.port() == base_port
                } else {
                    false
                };

                let text = element.text().collect::<String>().trim().to_string();
                Some(LinkEntry {
                    href: resolved,
                    text: (!text.is_empty()).then_some(text),
                    aria_label: element
                        .value()
                        .attr("aria-label")
                        .map(|s| s.trim().to_string()),
                    is_internal,
                    position: idx as i64,
                })
            })
            .collect()
    }

    /// In-page anchors that plausibly bypass blocks: "skip" wording or the
    /// very first focusable link on the page.
    pub fn extract_skip_links(html: &Html, base_url: &str) -> Vec<LinkEntry> {
        Self::extract_links(html, base_url)
            .into_iter()
            .filter(|l| l.href.starts_with('#'))
            .filter(|l| {
                let text = l
                    .text
                    .as_deref()
                    .unwrap_or_default()
                    .to_lowercase();
                l.position == 0 || text.contains("skip") || text.contains("zum inhalt")
            })
            .collect()
    }

    pub fn extract_nav_link_sets(html: &Html) -> Vec<Vec<String>> {
        html.select(selector!("nav, [role='navigation']"))
            .map(|nav| {
                nav.select(selector!("a[href]"))
                    .map(|a| a.text().collect::<String>().trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .collect()
    }

    pub fn extract_tables(html: &Html) -> Vec<TableEntry> {
        html.select(selector!("table"))
            .map(|table| TableEntry {
                has_headers: table.select(selector!("th")).next().is_some(),
                has_caption: table.select(selector!("caption")).next().is_some(),
            })
            .collect()
    }

    pub fn extract_lists(html: &Html) -> ListStats {
        ListStats {
            unordered: html.select(selector!("ul")).count(),
            ordered: html.select(selector!("ol")).count(),
            definition: html.select(selector!("dl")).count(),
        }
    }

    fn collect_ids(html: &Html) -> Vec<String> {
        html.select(selector!("[id]"))
            .filter_map(|el| el.value().attr("id"))
            .map(str::to_string)
            .collect()
    }

    fn duplicate_ids(ids: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for id in ids {
            if !seen.insert(id.as_str()) && !duplicates.contains(id) {
                duplicates.push(id.clone());
            }
        }
        duplicates
    }

    fn unresolved_aria_refs(html: &Html, ids: &[String]) -> Vec<AriaRef> {
        let id_set: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut refs = Vec::new();

        for attr in ["aria-labelledby", "aria-describedby"] {
            for element in html.select(selector!("[aria-labelledby], [aria-describedby]")) {
                if let Some(value) = element.value().attr(attr) {
                    for target in value.split_whitespace() {
                        if !id_set.contains(target) {
                            refs.push(AriaRef {
                                attr: attr.to_string(),
                                target_id: target.to_string(),
                                resolved: false,
                            });
                        }
                    }
                }
            }
        }

        refs
    }

    pub fn extract_color_pairs(html: &Html) -> Vec<ColorPair> {
        static COLOR_RE: OnceLock<Regex> = OnceLock::new();
        static BG_RE: OnceLock<Regex> = OnceLock::new();
        let color_re = COLOR_RE
            .get_or_init(|| Regex::new(r"(?:^|;)\s*color\s*:\s*([^;]+)").unwrap());
        let bg_re = BG_RE.get_or_init(|| {
            Regex::new(r"background(?:-color)?\s*:\s*([^;]+)").unwrap()
        });

        html.select(selector!("[style]"))
            .filter_map(|element| {
                let style = element.value().attr("style")?;
                let color = color_re
                    .captures(style)
                    .map(|c| c[1].trim().to_string());
                let background = bg_re
                    .captures(style)
                    .map(|c| c[1].trim().to_string());
                if color.is_none() && background.is_none() {
                    return None;
                }
                Some(ColorPair {
                    color,
                    background,
                    element: element.value().name().to_string(),
                })
            })
            .collect()
    }

    pub fn extract_font_sizes(html: &Html) -> Vec<FontSizeEntry> {
        static FONT_RE: OnceLock<Regex> = OnceLock::new();
        let font_re = FONT_RE.get_or_init(|| {
            Regex::new(r"font-size\s*:\s*([\d.]+)\s*(px|pt|em|rem|%)").unwrap()
        });

        html.select(selector!("[style]"))
            .filter_map(|element| {
                let style = element.value().attr("style")?;
                let caps = font_re.captures(style)?;
                let value = caps[1].parse::<f64>().ok()?;
                let unit = caps[2].to_string();
                let relative = matches!(unit.as_str(), "em" | "rem" | "%");
                Some(FontSizeEntry {
                    value,
                    unit,
                    relative,
                })
            })
            .collect()
    }

    pub fn extract_language_switches(html: &Html, doc_lang: Option<&str>) -> Vec<LangSwitch> {
        html.select(selector!("[lang]"))
            .filter(|el| el.value().name() != "html")
            .filter_map(|el| {
                let lang = el.value().attr("lang")?.trim().to_string();
                if Some(lang.as_str()) == doc_lang {
                    return None;
                }
                let sample = el.text().collect::<String>().trim().chars().take(80).collect();
                Some(LangSwitch { lang, sample })
            })
            .collect()
    }

    pub fn extract_interactive(html: &Html) -> Vec<InteractiveEntry> {
        let mut entries = Vec::new();

        for element in html.select(selector!(
            "div[onclick], span[onclick], div[role='button'], span[role='button'], \
             div[role='link'], span[role='link'], [tabindex]"
        )) {
            let tabindex = element
                .value()
                .attr("tabindex")
                .and_then(|t| t.trim().parse::<i64>().ok());
            entries.push(InteractiveEntry {
                tag: element.value().name().to_string(),
                role: element.value().attr("role").map(str::to_string),
                tabindex,
                has_click_handler: element.value().attr("onclick").is_some(),
                accessible_name: accessible_label(&element),
            });
        }

        entries
    }

    pub fn extract_accesskeys(html: &Html) -> Vec<String> {
        html.select(selector!("[accesskey]"))
            .filter_map(|el| el.value().attr("accesskey"))
            .map(str::to_string)
            .collect()
    }

    pub fn count_aria_live(html: &Html) -> usize {
        html.select(selector!("[aria-live], [role='status'], [role='alert']"))
            .count()
    }

    pub fn count_animation_hints(html: &Html) -> usize {
        html.select(selector!("[style]"))
            .filter(|el| {
                el.value()
                    .attr("style")
                    .is_some_and(|s| s.contains("animation"))
            })
            .count()
            + html.select(selector!("marquee, blink")).count()
    }

    pub fn extract_meta_refresh(html: &Html) -> Option<String> {
        html.select(selector!("meta[http-equiv]"))
            .find(|el| {
                el.value()
                    .attr("http-equiv")
                    .is_some_and(|v| v.eq_ignore_ascii_case("refresh"))
            })
            .and_then(|el| el.value().attr("content"))
            .map(str::to_string)
    }

    pub fn extract_viewport(html: &Html) -> Option<String> {
        html.select(selector!("meta[name='viewport']"))
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(str::to_string)
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn resolve(base: &Option<Url>, href: &str) -> String {
    match base {
        Some(base) => base
            .join(href)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| href.to_string()),
        None => href.to_string(),
    }
}

fn embed_provider(src: &str) -> Option<&'static str> {
    if src.contains("youtube.com/embed") || src.contains("youtube-nocookie.com/embed") {
        Some("youtube")
    } else if src.contains("player.vimeo.com") {
        Some("vimeo")
    } else if src.contains("dailymotion.com/embed") {
        Some("dailymotion")
    } else {
        None
    }
}

fn is_captcha_marker(element: &ElementRef, src: &str) -> bool {
    let in_attrs = element
        .value()
        .attr("class")
        .into_iter()
        .chain(element.value().attr("id"))
        .chain(element.value().attr("alt"))
        .any(|v| v.to_lowercase().contains("captcha"));
    in_attrs || src.to_lowercase().contains("captcha")
}

/// aria-label, falling back to title.
fn accessible_label(element: &ElementRef) -> Option<String> {
    element
        .value()
        .attr("aria-label")
        .or_else(|| element.value().attr("title"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Trimmed text of the parent element, capped for prompt size.
fn surrounding_text(element: &ElementRef) -> Option<String> {
    let parent = element.parent()?;
    let parent_el = ElementRef::wrap(parent)?;
    let text: String = parent_el.text().collect::<String>();
    let trimmed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(120).collect())
}

/// Text of an enclosing `<label>`, if any.
fn wrapping_label_text(field: &ElementRef) -> Option<String> {
    for ancestor in field.ancestors() {
        if let Some(el) = ElementRef::wrap(ancestor) {
            if el.value().name() == "label" {
                let text = el.text().collect::<String>().trim().to_string();
                return (!text.is_empty()).then_some(text);
            }
        }
    }
    None
}

fn selector_for_landmark(tag: &str) -> &'static Selector {
    static HEADER: OnceLock<Selector> = OnceLock::new();
    static NAV: OnceLock<Selector> = OnceLock::new();
    static MAIN: OnceLock<Selector> = OnceLock::new();
    static FOOTER: OnceLock<Selector> = OnceLock::new();
    static ASIDE: OnceLock<Selector> = OnceLock::new();
    match tag {
        "header" => HEADER.get_or_init(|| Selector::parse("header").unwrap()),
        "nav" => NAV.get_or_init(|| Selector::parse("nav").unwrap()),
        "main" => MAIN.get_or_init(|| Selector::parse("main").unwrap()),
        "footer" => FOOTER.get_or_init(|| Selector::parse("footer").unwrap()),
        _ => ASIDE.get_or_init(|| Selector::parse("aside").unwrap()),
    }
}
