//! Choosing between the JSON and the explorer renderings using the Accept header.

use http::HeaderMap;
use http::header::ACCEPT;
use mediatype::MediaType;
use mediatype::MediaTypeList;
use mediatype::Name;
use mediatype::ReadParams;
use mediatype::names::_STAR;
use mediatype::names::APPLICATION;
use mediatype::names::HTML;
use mediatype::names::JSON;
use mediatype::names::TEXT;

/// How a result leaves the endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ResponseStrategy {
    Json,
    Explorer,
}

impl ResponseStrategy {
    /// Explorer only when the client did not ask for `raw`, the explorer is
    /// enabled and the client prefers HTML over JSON.
    pub(crate) fn select(headers: &HeaderMap, raw: bool, explorer_enabled: bool) -> Self {
        if !raw && explorer_enabled && prefers_html(headers) {
            ResponseStrategy::Explorer
        } else {
            ResponseStrategy::Json
        }
    }
}

/// An `Accept` entry matching one of our offers.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Priority {
    quality: f32,
    specificity: u8,
    order: usize,
}

/// Returns true when `text/html` wins the negotiation against `application/json`.
///
/// Offers are ranked by quality, then by how specific the matching entry is,
/// then by the entry's position in the header. On a tie JSON wins. Without
/// an `Accept` header JSON wins.
pub(crate) fn prefers_html(headers: &HeaderMap) -> bool {
    let accepted: Vec<(MediaType, usize)> = headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(MediaTypeList::new)
        .filter_map(Result::ok)
        .enumerate()
        .map(|(order, mime)| (mime, order))
        .collect();

    if accepted.is_empty() {
        return false;
    }

    let json = priority(&accepted, APPLICATION, JSON);
    let html = priority(&accepted, TEXT, HTML);

    match (json, html) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some(json), Some(html)) => {
            html.quality > json.quality
                || (html.quality == json.quality
                    && (html.specificity > json.specificity
                        || (html.specificity == json.specificity && html.order < json.order)))
        }
    }
}

fn priority(accepted: &[(MediaType, usize)], ty: Name, subty: Name) -> Option<Priority> {
    let mut best: Option<Priority> = None;
    for (mime, order) in accepted {
        let specificity = if mime.ty == ty && mime.subty == subty {
            2
        } else if mime.ty == ty && mime.subty == _STAR {
            1
        } else if mime.ty == _STAR && mime.subty == _STAR {
            0
        } else {
            continue;
        };
        let candidate = Priority {
            quality: quality(mime),
            specificity,
            order: *order,
        };
        // the most specific entry decides; later entries win ties
        best = match best {
            Some(current)
                if (current.specificity, current.quality)
                    > (candidate.specificity, candidate.quality) =>
            {
                Some(current)
            }
            _ => Some(candidate),
        };
    }
    best.filter(|priority| priority.quality > 0.0)
}

fn quality(mime: &MediaType) -> f32 {
    Name::new("q")
        .and_then(|q| mime.get_param(q))
        .and_then(|value| value.as_str().trim().parse::<f32>().ok())
        .filter(|q| (0.0..=1.0).contains(q))
        .unwrap_or(1.0)
}
