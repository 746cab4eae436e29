//! Country name standardization and centroid lookup
//!
//! Country strings in sample metadata are free text ("USA: Texas", "Viet Nam",
//! "uk", "Republic of Korea"). Grouping and map placement both go through
//! [`CountryTable::standardize`] so the same place always lands in one bucket.

use std::collections::HashMap;

use crate::types::LatLon;

/// Name used when metadata carries no country
pub const UNKNOWN_COUNTRY: &str = "Unknown";

const ALIASES: &[(&str, &str)] = &[
    ("usa", "United States"),
    ("us", "United States"),
    ("u.s.", "United States"),
    ("u.s.a.", "United States"),
    ("united states of america", "United States"),
    ("uk", "United Kingdom"),
    ("u.k.", "United Kingdom"),
    ("great britain", "United Kingdom"),
    ("england", "United Kingdom"),
    ("scotland", "United Kingdom"),
    ("wales", "United Kingdom"),
    ("viet nam", "Vietnam"),
    ("south korea", "South Korea"),
    ("republic of korea", "South Korea"),
    ("korea", "South Korea"),
    ("north korea", "North Korea"),
    ("russian federation", "Russia"),
    ("czechia", "Czech Republic"),
    ("drc", "Democratic Republic of the Congo"),
    ("dr congo", "Democratic Republic of the Congo"),
    ("congo-kinshasa", "Democratic Republic of the Congo"),
    ("congo-brazzaville", "Republic of the Congo"),
    ("cote d'ivoire", "Ivory Coast"),
    ("côte d'ivoire", "Ivory Coast"),
    ("holland", "Netherlands"),
    ("the netherlands", "Netherlands"),
    ("prc", "China"),
    ("people's republic of china", "China"),
    ("hong kong", "China"),
    ("taiwan, province of china", "Taiwan"),
    ("uae", "United Arab Emirates"),
    ("iran, islamic republic of", "Iran"),
    ("burma", "Myanmar"),
    ("swaziland", "Eswatini"),
    ("turkiye", "Turkey"),
    ("türkiye", "Turkey"),
];

/// Built-in centroid table (approximate geographic centres, decimal degrees)
const CENTROIDS: &[(&str, f64, f64)] = &[
    ("Afghanistan", 33.94, 67.71),
    ("Albania", 41.15, 20.17),
    ("Algeria", 28.03, 1.66),
    ("Angola", -11.20, 17.87),
    ("Argentina", -38.42, -63.62),
    ("Armenia", 40.07, 45.04),
    ("Australia", -25.27, 133.78),
    ("Austria", 47.52, 14.55),
    ("Bangladesh", 23.68, 90.36),
    ("Belgium", 50.50, 4.47),
    ("Benin", 9.31, 2.32),
    ("Bolivia", -16.29, -63.59),
    ("Botswana", -22.33, 24.68),
    ("Brazil", -14.24, -51.93),
    ("Bulgaria", 42.73, 25.49),
    ("Burkina Faso", 12.24, -1.56),
    ("Cambodia", 12.57, 104.99),
    ("Cameroon", 7.37, 12.35),
    ("Canada", 56.13, -106.35),
    ("Chile", -35.68, -71.54),
    ("China", 35.86, 104.20),
    ("Colombia", 4.57, -74.30),
    ("Costa Rica", 9.75, -83.75),
    ("Croatia", 45.10, 15.20),
    ("Cuba", 21.52, -77.78),
    ("Czech Republic", 49.82, 15.47),
    ("Democratic Republic of the Congo", -4.04, 21.76),
    ("Denmark", 56.26, 9.50),
    ("Ecuador", -1.83, -78.18),
    ("Egypt", 26.82, 30.80),
    ("Eswatini", -26.52, 31.47),
    ("Ethiopia", 9.15, 40.49),
    ("Finland", 61.92, 25.75),
    ("France", 46.23, 2.21),
    ("Gabon", -0.80, 11.61),
    ("Germany", 51.17, 10.45),
    ("Ghana", 7.95, -1.02),
    ("Greece", 39.07, 21.82),
    ("Guatemala", 15.78, -90.23),
    ("Guinea", 9.95, -9.70),
    ("Haiti", 18.97, -72.29),
    ("Honduras", 15.20, -86.24),
    ("Hungary", 47.16, 19.50),
    ("Iceland", 64.96, -19.02),
    ("India", 20.59, 78.96),
    ("Indonesia", -0.79, 113.92),
    ("Iran", 32.43, 53.69),
    ("Iraq", 33.22, 43.68),
    ("Ireland", 53.41, -8.24),
    ("Israel", 31.05, 34.85),
    ("Italy", 41.87, 12.57),
    ("Ivory Coast", 7.54, -5.55),
    ("Japan", 36.20, 138.25),
    ("Jordan", 30.59, 36.24),
    ("Kazakhstan", 48.02, 66.92),
    ("Kenya", -0.02, 37.91),
    ("Laos", 19.86, 102.50),
    ("Lebanon", 33.85, 35.86),
    ("Madagascar", -18.77, 46.87),
    ("Malawi", -13.25, 34.30),
    ("Malaysia", 4.21, 101.98),
    ("Mali", 17.57, -4.00),
    ("Mexico", 23.63, -102.55),
    ("Mongolia", 46.86, 103.85),
    ("Morocco", 31.79, -7.09),
    ("Mozambique", -18.67, 35.53),
    ("Myanmar", 21.91, 95.96),
    ("Nepal", 28.39, 84.12),
    ("Netherlands", 52.13, 5.29),
    ("New Zealand", -40.90, 174.89),
    ("Nicaragua", 12.87, -85.21),
    ("Niger", 17.61, 8.08),
    ("Nigeria", 9.08, 8.68),
    ("North Korea", 40.34, 127.51),
    ("Norway", 60.47, 8.47),
    ("Pakistan", 30.38, 69.35),
    ("Panama", 8.54, -80.78),
    ("Papua New Guinea", -6.31, 143.96),
    ("Paraguay", -23.44, -58.44),
    ("Peru", -9.19, -75.02),
    ("Philippines", 12.88, 121.77),
    ("Poland", 51.92, 19.15),
    ("Portugal", 39.40, -8.22),
    ("Qatar", 25.35, 51.18),
    ("Republic of the Congo", -0.23, 15.83),
    ("Romania", 45.94, 24.97),
    ("Russia", 61.52, 105.32),
    ("Rwanda", -1.94, 29.87),
    ("Saudi Arabia", 23.89, 45.08),
    ("Senegal", 14.50, -14.45),
    ("Serbia", 44.02, 21.01),
    ("Sierra Leone", 8.46, -11.78),
    ("Singapore", 1.35, 103.82),
    ("Slovakia", 48.67, 19.70),
    ("Slovenia", 46.15, 14.99),
    ("Somalia", 5.15, 46.20),
    ("South Africa", -30.56, 22.94),
    ("South Korea", 35.91, 127.77),
    ("South Sudan", 6.88, 31.31),
    ("Spain", 40.46, -3.75),
    ("Sri Lanka", 7.87, 80.77),
    ("Sudan", 12.86, 30.22),
    ("Sweden", 60.13, 18.64),
    ("Switzerland", 46.82, 8.23),
    ("Syria", 34.80, 38.99),
    ("Taiwan", 23.70, 120.96),
    ("Tanzania", -6.37, 34.89),
    ("Thailand", 15.87, 100.99),
    ("Tunisia", 33.89, 9.54),
    ("Turkey", 38.96, 35.24),
    ("Uganda", 1.37, 32.29),
    ("Ukraine", 48.38, 31.17),
    ("United Arab Emirates", 23.42, 53.85),
    ("United Kingdom", 55.38, -3.44),
    ("United States", 37.09, -95.71),
    ("Uruguay", -32.52, -55.77),
    ("Uzbekistan", 41.38, 64.59),
    ("Venezuela", 6.42, -66.59),
    ("Vietnam", 14.06, 108.28),
    ("Yemen", 15.55, 48.52),
    ("Zambia", -13.13, 27.85),
    ("Zimbabwe", -19.02, 29.15),
];

/// Country name → centroid table with alias-aware standardization
#[derive(Debug, Clone)]
pub struct CountryTable {
    /// lowercase name → (canonical name, centroid)
    entries: HashMap<String, (String, LatLon)>,
    /// lowercase alias → canonical name
    aliases: HashMap<String, String>,
}

impl Default for CountryTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CountryTable {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
            aliases: HashMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let mut table = Self::empty();
        for &(name, lat, lon) in CENTROIDS {
            table.insert(name, LatLon::new(lat, lon));
        }
        for &(alias, canonical) in ALIASES {
            table.add_alias(alias, canonical);
        }
        table
    }

    pub fn insert(&mut self, name: &str, centroid: LatLon) {
        self.entries
            .insert(name.trim().to_lowercase(), (name.trim().to_string(), centroid));
    }

    pub fn add_alias(&mut self, alias: &str, canonical: &str) {
        self.aliases
            .insert(alias.trim().to_lowercase(), canonical.trim().to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Centroid for a standardized (or raw) country name
    pub fn centroid(&self, name: &str) -> Option<LatLon> {
        let canonical = self.standardize(name);
        self.entries
            .get(&canonical.to_lowercase())
            .map(|(_, loc)| *loc)
    }

    /// Map free-text country input onto one canonical name.
    ///
    /// Order: region suffix stripped (`"USA: Texas"`), alias table, exact
    /// table name, then the longest table name or alias contained in the text.
    /// Unrecognized input is returned trimmed, never dropped.
    pub fn standardize(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        let head = trimmed.split(':').next().unwrap_or("").trim();
        if head.is_empty() {
            return UNKNOWN_COUNTRY.to_string();
        }
        let lower = head.to_lowercase();

        if let Some(canonical) = self.aliases.get(&lower) {
            return canonical.clone();
        }
        if let Some((canonical, _)) = self.entries.get(&lower) {
            return canonical.clone();
        }

        let contained = self
            .entries
            .iter()
            .filter(|(key, _)| key.len() >= 4 && lower.contains(key.as_str()))
            .max_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| b.cmp(a)))
            .map(|(_, (canonical, _))| canonical.clone());
        if let Some(canonical) = contained {
            return canonical;
        }

        let words: Vec<&str> = lower
            .split(|c: char| !(c.is_alphanumeric() || c == '.'))
            .filter(|w| !w.is_empty())
            .collect();
        if let Some(canonical) = words.iter().find_map(|w| self.aliases.get(*w)) {
            return canonical.clone();
        }

        head.to_string()
    }
}
