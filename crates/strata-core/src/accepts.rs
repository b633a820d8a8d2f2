//! `Accept` header negotiation.

use crate::media_type;
use http::header::ACCEPT;
use http::HeaderMap;
use mime::Mime;

#[derive(Debug, Clone)]
struct MediaRange {
    type_: String,
    subtype: String,
    quality: f32,
}

impl MediaRange {
    fn parse(raw: &str) -> Option<Self> {
        let parsed: Mime = raw.trim().parse().ok()?;
        let quality = parsed
            .get_param("q")
            .and_then(|q| q.as_str().parse::<f32>().ok())
            .unwrap_or(1.0)
            .clamp(0.0, 1.0);
        Some(Self {
            type_: parsed.type_().as_str().to_ascii_lowercase(),
            subtype: parsed.subtype().as_str().to_ascii_lowercase(),
            quality,
        })
    }

    fn specificity(&self, type_: &str, subtype: &str) -> Option<u8> {
        match (self.type_.as_str(), self.subtype.as_str()) {
            ("*", "*") => Some(0),
            (t, "*") if t == type_ => Some(1),
            (t, s) if t == type_ && s == subtype => Some(2),
            _ => None,
        }
    }
}

/// Parsed `Accept` header of a request.
///
/// A request without an `Accept` header accepts everything.
///
/// ```
/// use http::HeaderMap;
/// use strata_core::Accepts;
///
/// let mut headers = HeaderMap::new();
/// headers.insert("accept", "application/json, text/*;q=0.5".parse().unwrap());
/// let accepts = Accepts::from_headers(&headers);
///
/// assert_eq!(accepts.types(&["html", "json"]), Some("json"));
/// assert!(accepts.accepts("text/plain"));
/// assert!(!accepts.accepts("png"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Accepts {
    ranges: Option<Vec<MediaRange>>,
}

impl Accepts {
    /// Parses the `Accept` header out of `headers`.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let values: Vec<&str> = headers
            .get_all(ACCEPT)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect();
        if values.is_empty() {
            return Self::default();
        }
        let ranges = values
            .iter()
            .flat_map(|value| value.split(','))
            .filter_map(MediaRange::parse)
            .collect();
        Self {
            ranges: Some(ranges),
        }
    }

    /// Quality the client assigns to `offer`, `0.0` meaning rejected.
    fn quality(&self, offer: &str) -> f32 {
        let Some(ranges) = &self.ranges else {
            return 1.0;
        };
        let resolved = if offer.contains('/') {
            offer.to_ascii_lowercase()
        } else {
            match media_type::lookup(offer) {
                Some(found) => found.to_string(),
                None => return 0.0,
            }
        };
        let Some((type_, subtype)) = resolved.split_once('/') else {
            return 0.0;
        };
        ranges
            .iter()
            .filter_map(|range| {
                range
                    .specificity(type_, subtype)
                    .map(|rank| (rank, range.quality))
            })
            .max_by_key(|(rank, _)| *rank)
            .map_or(0.0, |(_, quality)| quality)
    }

    /// Picks the best of `offers`, preferring earlier offers on ties.
    ///
    /// Offers may be shorthands (`"json"`) or full types.
    #[must_use]
    pub fn types<'o>(&self, offers: &[&'o str]) -> Option<&'o str> {
        let mut best: Option<(&'o str, f32)> = None;
        for offer in offers {
            let quality = self.quality(offer);
            if quality <= 0.0 {
                continue;
            }
            if best.map_or(true, |(_, q)| quality > q) {
                best = Some((offer, quality));
            }
        }
        best.map(|(offer, _)| offer)
    }

    /// Whether a single type is acceptable.
    #[must_use]
    pub fn accepts(&self, offer: &str) -> bool {
        self.quality(offer) > 0.0
    }
}
