/// Named colour ramps, listed as evenly spaced hex stops from low to high.
pub struct PaletteInfo {
    pub name: &'static str,
    pub stops: &'static [&'static str],
}

pub const PALETTES: &[PaletteInfo] = &[
    PaletteInfo {
        name: "viridis",
        stops: &[
            "#440154", "#482777", "#3f4a8a", "#31678e", "#26838f", "#1f9d8a", "#6cce5a",
            "#b6de2b", "#fee825",
        ],
    },
    PaletteInfo {
        name: "spectral",
        stops: &[
            "#9e0142", "#d53e4f", "#f46d43", "#fdae61", "#fee08b", "#ffffbf", "#e6f598",
            "#abdda4", "#66c2a5", "#3288bd", "#5e4fa2",
        ],
    },
    PaletteInfo {
        name: "rdylbu",
        stops: &[
            "#a50026", "#d73027", "#f46d43", "#fdae61", "#fee090", "#ffffbf", "#e0f3f8",
            "#abd9e9", "#74add1", "#4575b4", "#313695",
        ],
    },
    PaletteInfo {
        name: "greys",
        stops: &[
            "#ffffff", "#f0f0f0", "#d9d9d9", "#bdbdbd", "#969696", "#737373", "#525252",
            "#252525", "#000000",
        ],
    },
    PaletteInfo {
        name: "magma",
        stops: &[
            "#000004", "#1c1044", "#4f127b", "#812581", "#b5367a", "#e55964", "#fb8761",
            "#fec287", "#fcfdbf",
        ],
    },
    PaletteInfo {
        name: "plasma",
        stops: &[
            "#0d0887", "#5302a3", "#8b0aa5", "#b83289", "#db5c68", "#f48849", "#febd2a",
            "#f0f921",
        ],
    },
    PaletteInfo {
        name: "inferno",
        stops: &[
            "#000004", "#1f0c48", "#550f6d", "#88226a", "#ba3655", "#e35933", "#f98c0a",
            "#f9c932", "#fcffa4",
        ],
    },
];

/// Palette lookup is case-insensitive, matching how stylesheets spell names (`RdYlBu`, `Viridis`).
pub fn get_palette(name: &str) -> Option<&'static PaletteInfo> {
    PALETTES.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}
