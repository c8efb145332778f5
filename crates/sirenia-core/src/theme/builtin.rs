use super::ThemeDefinition;

/// The eleven color roles every shipped palette defines.
pub const PALETTE_ROLES: [&str; 11] = [
    "primaryColor",
    "primaryTextColor",
    "primaryBorderColor",
    "secondaryColor",
    "secondaryTextColor",
    "secondaryBorderColor",
    "tertiaryColor",
    "tertiaryTextColor",
    "tertiaryBorderColor",
    "lineColor",
    "textColor",
];

// Values follow PALETTE_ROLES order.
const DARK: [&str; 11] = [
    "#1f2020", "#e0dfdf", "#81b1db", "#3a3a3a", "#cccccc", "#666666", "#2d2d2d", "#cccccc",
    "#555555", "#81b1db", "#cccccc",
];

const FOREST: [&str; 11] = [
    "#cde498", "#000000", "#13540c", "#cdffb2", "#000000", "#6eaa49", "#f4f4f4", "#000000",
    "#aaaaaa", "#008000", "#000000",
];

const NEUTRAL: [&str; 11] = [
    "#eeeeee", "#333333", "#999999", "#f4f4f4", "#333333", "#cccccc", "#ffffff", "#333333",
    "#dddddd", "#666666", "#333333",
];

fn palette(name: &str, description: &str, values: [&str; 11]) -> ThemeDefinition {
    ThemeDefinition::new(
        name,
        PALETTE_ROLES
            .iter()
            .zip(values)
            .map(|(role, value)| (role.to_string(), value.into())),
    )
    .with_description(description)
}

/// Built-in themes in listing order; the engine-default theme comes first.
pub(crate) fn builtin_themes() -> Vec<ThemeDefinition> {
    vec![
        ThemeDefinition::new(super::DEFAULT_THEME, std::iter::empty())
            .with_description("Engine defaults, no overrides"),
        palette("dark", "Dark background with light text", DARK),
        palette("forest", "Green, forest-toned palette", FOREST),
        palette("neutral", "Light greyscale palette for print", NEUTRAL),
    ]
}
