//! Per-axis projections over the site snapshot.
//!
//! Each slicer reduces the full structural model to exactly what that axis's
//! prompt needs, keeping module payloads small and on-topic. The table at the
//! bottom is the only place slicers are registered; the dispatcher iterates
//! the axis registry and never names an axis.

use serde_json::{json, Value};

use crate::domain::axes::AxisKey;
use super::SiteSnapshot;

pub type SliceFn = fn(&SiteSnapshot) -> Value;

/// Slicer for one axis.
pub fn slicer(axis: AxisKey) -> SliceFn {
    SLICERS
        .iter()
        .find(|(key, _)| *key == axis)
        .map(|(_, f)| *f)
        .expect("every axis has a registered slicer")
}

/// Build the slice for one axis.
pub fn slice_for(axis: AxisKey, site: &SiteSnapshot) -> Value {
    slicer(axis)(site)
}

const SLICERS: [(AxisKey, SliceFn); 12] = [
    (AxisKey::TextAlternatives, slice_text_alternatives),
    (AxisKey::TimeBasedMedia, slice_time_based_media),
    (AxisKey::Adaptable, slice_adaptable),
    (AxisKey::Distinguishable, slice_distinguishable),
    (AxisKey::KeyboardAccessible, slice_keyboard),
    (AxisKey::EnoughTime, slice_enough_time),
    (AxisKey::Seizures, slice_seizures),
    (AxisKey::Navigable, slice_navigable),
    (AxisKey::Readable, slice_readable),
    (AxisKey::Predictable, slice_predictable),
    (AxisKey::InputAssistance, slice_input_assistance),
    (AxisKey::Compatible, slice_compatible),
];

fn per_page<F: Fn(&super::PageStructure) -> Value>(site: &SiteSnapshot, f: F) -> Value {
    Value::Array(
        site.pages
            .iter()
            .map(|p| {
                let mut obj = json!({ "url": &p.url });
                if let Value::Object(extra) = f(p) {
                    obj.as_object_mut().unwrap().extend(extra);
                }
                obj
            })
            .collect(),
    )
}

fn slice_text_alternatives(site: &SiteSnapshot) -> Value {
    per_page(site, |p| {
        json!({
            "images": &p.images,
        })
    })
}

fn slice_time_based_media(site: &SiteSnapshot) -> Value {
    per_page(site, |p| {
        json!({
            "media": &p.media,
            "transcript_links": p.links.iter()
                .filter(|l| {
                    let t = l.text.as_deref().unwrap_or_default().to_lowercase();
                    t.contains("transcript") || t.contains("transkript")
                })
                .collect::<Vec<_>>(),
        })
    })
}

fn slice_adaptable(site: &SiteSnapshot) -> Value {
    per_page(site, |p| {
        json!({
            "headings": &p.headings,
            "tables": &p.tables,
            "lists": &p.lists,
            "landmarks": &p.landmarks,
            "forms": &p.forms,
        })
    })
}

fn slice_distinguishable(site: &SiteSnapshot) -> Value {
    per_page(site, |p| {
        json!({
            "color_pairs": &p.color_pairs,
            "font_sizes": &p.font_sizes,
            "viewport_meta": &p.viewport_meta,
            "media_with_autoplay": p.media.iter().filter(|m| m.autoplay).count(),
        })
    })
}

fn slice_keyboard(site: &SiteSnapshot) -> Value {
    per_page(site, |p| {
        json!({
            "interactive_elements": &p.interactive,
            "accesskeys": &p.accesskeys,
            "positive_tabindex": p.interactive.iter()
                .filter(|i| i.tabindex.is_some_and(|t| t > 0))
                .count(),
        })
    })
}

fn slice_enough_time(site: &SiteSnapshot) -> Value {
    per_page(site, |p| {
        json!({
            "meta_refresh": &p.meta_refresh,
            "autoplaying_media": p.media.iter().filter(|m| m.autoplay).collect::<Vec<_>>(),
            "animation_hints": p.animation_hints,
        })
    })
}

fn slice_seizures(site: &SiteSnapshot) -> Value {
    per_page(site, |p| {
        json!({
            "autoplaying_media": p.media.iter().filter(|m| m.autoplay).collect::<Vec<_>>(),
            "animated_images": p.images.iter()
                .filter(|i| i.src.to_lowercase().ends_with(".gif"))
                .collect::<Vec<_>>(),
            "animation_hints": p.animation_hints,
        })
    })
}

fn slice_navigable(site: &SiteSnapshot) -> Value {
    per_page(site, |p| {
        json!({
            "title": &p.title,
            "headings": &p.headings,
            "landmarks": &p.landmarks,
            "skip_links": &p.skip_links,
            "links": p.links.iter().map(|l| json!({
                "href": l.href,
                "text": l.text,
                "aria_label": l.aria_label,
            })).collect::<Vec<_>>(),
        })
    })
}

fn slice_readable(site: &SiteSnapshot) -> Value {
    per_page(site, |p| {
        json!({
            "lang": &p.lang,
            "language_switches": &p.language_switches,
            "word_count": p.word_count,
        })
    })
}

fn slice_predictable(site: &SiteSnapshot) -> Value {
    per_page(site, |p| {
        json!({
            "nav_link_sets": &p.nav_link_sets,
            "forms": p.forms.iter().map(|f| json!({
                "has_submit": f.has_submit,
                "field_count": f.fields.len(),
            })).collect::<Vec<_>>(),
        })
    })
}

fn slice_input_assistance(site: &SiteSnapshot) -> Value {
    per_page(site, |p| {
        json!({
            "forms": &p.forms,
        })
    })
}

fn slice_compatible(site: &SiteSnapshot) -> Value {
    per_page(site, |p| {
        json!({
            "duplicate_ids": &p.duplicate_ids,
            "unresolved_aria_refs": &p.unresolved_aria_refs,
            "custom_controls": &p.interactive,
            "aria_live_regions": p.aria_live_regions,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::SiteContext;
    use crate::extractor::PageExtractor;

    fn site() -> SiteSnapshot {
        let html = r##"
        <html lang="en"><head><title>T</title></head><body>
          <a href="#main">Skip to content</a>
          <main id="main">
            <h1>Head</h1>
            <img src="/a.png" alt="A">
            <img src="/anim.gif" alt="">
            <video autoplay></video>
            <form><input type="text" id="q"></form>
          </main>
        </body></html>"##;
        SiteSnapshot {
            root_url: "https://example.com/".into(),
            context: SiteContext::default(),
            pages: vec![PageExtractor::extract(html, "https://example.com/")],
            failed_pages: 0,
        }
    }

    #[test]
    fn every_axis_has_a_slicer() {
        let site = site();
        for axis in AxisKey::ALL {
            let value = slice_for(axis, &site);
            let pages = value.as_array().expect("slice is a per-page array");
            assert_eq!(pages.len(), 1);
            assert_eq!(pages[0]["url"], "https://example.com/");
        }
    }

    #[test]
    fn text_alternatives_slice_lists_images() {
        let site = site();
        let slice = slice_for(AxisKey::TextAlternatives, &site);
        let images = slice[0]["images"].as_array().unwrap();
        assert_eq!(images.len(), 2);
    }

    #[test]
    fn seizures_slice_flags_gif_and_autoplay() {
        let site = site();
        let slice = slice_for(AxisKey::Seizures, &site);
        assert_eq!(slice[0]["autoplaying_media"].as_array().unwrap().len(), 1);
        assert_eq!(slice[0]["animated_images"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn navigable_slice_carries_skip_links() {
        let site = site();
        let slice = slice_for(AxisKey::Navigable, &site);
        assert_eq!(slice[0]["skip_links"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn slices_are_json_serializable() {
        let site = site();
        for axis in AxisKey::ALL {
            let value = slice_for(axis, &site);
            assert!(serde_json::to_string(&value).is_ok());
        }
    }
}
