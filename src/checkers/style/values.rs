//! Property value validators

use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

/// Validates the value of one kind of property.
///
/// `validate` gets the value with `!important` already stripped. On failure it
/// may return a replacement value to suggest.
pub trait ValueValidator: Send + Sync {
    /// What the value should be, used in messages ("color", "length")
    fn kind(&self) -> &str;

    fn validate(&self, value: &str) -> Result<(), Option<String>>;
}

static HEX_COLOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{4}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})$")
        .expect("valid hex pattern")
});

static COLOR_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)(rgba?|hsla?)\(([^()]*)\)$").expect("valid color function pattern")
});

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)$").expect("valid number pattern"));

static COMPONENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:%|deg|rad|grad|turn)?$")
        .expect("valid component pattern")
});

static LENGTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?i)[+-]?(?:\d+\.?\d*|\.\d+)(?:px|em|rem|%|vh|vw|vmin|vmax|svh|lvh|dvh|svw|lvw|dvw|ch|ex|cap|lh|pt|pc|cm|mm|in|q|fr)$",
    )
    .expect("valid length pattern")
});

static LENGTH_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)(?:calc|min|max|clamp|var|env|fit-content)\(.*\)$")
        .expect("valid length function pattern")
});

const COLOR_KEYWORDS: [&str; 6] = [
    "transparent",
    "currentcolor",
    "inherit",
    "initial",
    "unset",
    "revert",
];

/// CSS Color 4 named colors, sorted
const NAMED_COLORS: [&str; 148] = [
    "aliceblue", "antiquewhite", "aqua", "aquamarine", "azure", "beige", "bisque", "black",
    "blanchedalmond", "blue", "blueviolet", "brown", "burlywood", "cadetblue", "chartreuse",
    "chocolate", "coral", "cornflowerblue", "cornsilk", "crimson", "cyan", "darkblue", "darkcyan",
    "darkgoldenrod", "darkgray", "darkgreen", "darkgrey", "darkkhaki", "darkmagenta",
    "darkolivegreen", "darkorange", "darkorchid", "darkred", "darksalmon", "darkseagreen",
    "darkslateblue", "darkslategray", "darkslategrey", "darkturquoise", "darkviolet", "deeppink",
    "deepskyblue", "dimgray", "dimgrey", "dodgerblue", "firebrick", "floralwhite", "forestgreen",
    "fuchsia", "gainsboro", "ghostwhite", "gold", "goldenrod", "gray", "green", "greenyellow",
    "grey", "honeydew", "hotpink", "indianred", "indigo", "ivory", "khaki", "lavender",
    "lavenderblush", "lawngreen", "lemonchiffon", "lightblue", "lightcoral", "lightcyan",
    "lightgoldenrodyellow", "lightgray", "lightgreen", "lightgrey", "lightpink", "lightsalmon",
    "lightseagreen", "lightskyblue", "lightslategray", "lightslategrey", "lightsteelblue",
    "lightyellow", "lime", "limegreen", "linen", "magenta", "maroon", "mediumaquamarine",
    "mediumblue", "mediumorchid", "mediumpurple", "mediumseagreen", "mediumslateblue",
    "mediumspringgreen", "mediumturquoise", "mediumvioletred", "midnightblue", "mintcream",
    "mistyrose", "moccasin", "navajowhite", "navy", "oldlace", "olive", "olivedrab", "orange",
    "orangered", "orchid", "palegoldenrod", "palegreen", "paleturquoise", "palevioletred",
    "papayawhip", "peachpuff", "peru", "pink", "plum", "powderblue", "purple", "rebeccapurple",
    "red", "rosybrown", "royalblue", "saddlebrown", "salmon", "sandybrown", "seagreen", "seashell",
    "sienna", "silver", "skyblue", "slateblue", "slategray", "slategrey", "snow", "springgreen",
    "steelblue", "tan", "teal", "thistle", "tomato", "turquoise", "violet", "wheat", "white",
    "whitesmoke", "yellow", "yellowgreen",
];

const LENGTH_KEYWORDS: [&str; 9] = [
    "auto",
    "none",
    "inherit",
    "initial",
    "unset",
    "revert",
    "fit-content",
    "max-content",
    "min-content",
];

/// Hex, `rgb()`/`rgba()`/`hsl()`/`hsla()`, named colors and color keywords
pub struct ColorValidator;

impl ColorValidator {
    fn valid_function(name: &str, args: &str) -> bool {
        // "1, 2, 3" or "1 2 3 / 0.5"
        let parts: Vec<&str> = args
            .split([',', '/'])
            .flat_map(str::split_whitespace)
            .collect();

        if !(3..=4).contains(&parts.len()) {
            return false;
        }
        if name.ends_with('a') && parts.len() != 4 && args.contains(',') {
            return false;
        }
        parts.iter().all(|p| COMPONENT.is_match(p))
    }
}

impl ValueValidator for ColorValidator {
    fn kind(&self) -> &str {
        "color"
    }

    fn validate(&self, value: &str) -> Result<(), Option<String>> {
        let lower = value.to_lowercase();

        if COLOR_KEYWORDS.contains(&lower.as_str())
            || NAMED_COLORS.contains(&lower.as_str())
            || HEX_COLOR.is_match(value)
        {
            return Ok(());
        }

        if let Some(caps) = COLOR_FUNCTION.captures(&lower) {
            if Self::valid_function(&caps[1], &caps[2]) {
                return Ok(());
            }
            return Err(None);
        }

        if lower.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(nearest_named_color(&lower).map(str::to_string));
        }

        Err(None)
    }
}

/// Number with unit, `0`, sizing keywords and math functions
pub struct LengthValidator;

impl ValueValidator for LengthValidator {
    fn kind(&self) -> &str {
        "length"
    }

    fn validate(&self, value: &str) -> Result<(), Option<String>> {
        let lower = value.to_lowercase();

        if LENGTH_KEYWORDS.contains(&lower.as_str())
            || LENGTH.is_match(value)
            || LENGTH_FUNCTION.is_match(value)
        {
            return Ok(());
        }

        if NUMBER.is_match(value) {
            if value.parse::<f64>().is_ok_and(|n| n == 0.0) {
                return Ok(());
            }
            return Err(Some(format!("{}px", value)));
        }

        Err(None)
    }
}

/// The validators every style checker starts with
pub fn default_validators() -> HashMap<String, Arc<dyn ValueValidator>> {
    let color: Arc<dyn ValueValidator> = Arc::new(ColorValidator);
    let length: Arc<dyn ValueValidator> = Arc::new(LengthValidator);

    let mut map = HashMap::new();
    for prop in [
        "color",
        "background-color",
        "border-color",
        "outline-color",
        "text-decoration-color",
        "caret-color",
    ] {
        map.insert(prop.to_string(), Arc::clone(&color));
    }
    for prop in [
        "width",
        "height",
        "min-width",
        "min-height",
        "max-width",
        "max-height",
        "top",
        "right",
        "bottom",
        "left",
        "font-size",
    ] {
        map.insert(prop.to_string(), Arc::clone(&length));
    }
    map
}

/// Closest named color within two edits
fn nearest_named_color(value: &str) -> Option<&'static str> {
    NAMED_COLORS
        .iter()
        .map(|name| (edit_distance(value, name), *name))
        .filter(|(distance, _)| *distance <= 2)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, name)| name)
}

fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == *cb {
                diagonal
            } else {
                1 + diagonal.min(above).min(row[j])
            };
            diagonal = above;
        }
    }

    row[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colors() {
        let v = ColorValidator;
        for ok in [
            "red",
            "Transparent",
            "#fff",
            "#A1B2C3",
            "#ffffff80",
            "rgb(255, 0, 0)",
            "rgba(0,0,0,0.5)",
            "rgb(0 0 0 / 50%)",
            "hsl(120deg, 50%, 50%)",
        ] {
            assert_eq!(v.validate(ok), Ok(()), "{}", ok);
        }

        assert_eq!(v.validate("reddd"), Err(Some("red".to_string())));
        assert_eq!(v.validate("#ggg"), Err(None));
        assert_eq!(v.validate("rgb(1, 2)"), Err(None));
        assert_eq!(v.validate("rgba(1, 2, 3)"), Err(None));
        assert_eq!(v.validate("zzzzzzzz"), Err(None));
    }

    #[test]
    fn test_extended_named_colors() {
        let v = ColorValidator;
        for ok in [
            "rebeccapurple",
            "DodgerBlue",
            "hotpink",
            "lightgoldenrodyellow",
            "papayawhip",
            "darkslategrey",
        ] {
            assert_eq!(v.validate(ok), Ok(()), "{}", ok);
        }
        assert_eq!(v.validate("hotpnk"), Err(Some("hotpink".to_string())));
    }

    #[test]
    fn test_named_color_table() {
        assert_eq!(NAMED_COLORS.len(), 148);
        assert!(NAMED_COLORS.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_lengths() {
        let v = LengthValidator;
        for ok in ["0", "10px", "1.5em", "50%", "-2rem", ".5vh", "auto", "calc(100% - 2px)", "0.0"] {
            assert_eq!(v.validate(ok), Ok(()), "{}", ok);
        }

        assert_eq!(v.validate("10"), Err(Some("10px".to_string())));
        assert_eq!(v.validate("10 px"), Err(None));
        assert_eq!(v.validate("big"), Err(None));
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("reddd", "red"), 2);
        assert_eq!(edit_distance("blue", "blue"), 0);
        assert_eq!(edit_distance("", "tan"), 3);
        assert_eq!(edit_distance("gren", "green"), 1);
    }

    #[test]
    fn test_default_registry() {
        let validators = default_validators();
        assert_eq!(validators["color"].kind(), "color");
        assert_eq!(validators["max-width"].kind(), "length");
        assert!(!validators.contains_key("margin"));
    }
}
