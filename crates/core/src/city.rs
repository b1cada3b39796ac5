#![forbid(unsafe_code)]

/// Post-import enrichment steps a city dataset opts into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Enrichment {
    /// Fill `wikipedia_url` from the `species_links` table.
    WikipediaLinks,
    /// Rewrite raw common names via the `species_names` table.
    HumanReadableNames,
}

/// The supported city datasets. Each city resolves to exactly one canonical
/// source name; `(source, objectid)` is the record identity across imports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum City {
    Toronto,
    Ottawa,
    Montreal,
    Calgary,
    Waterloo,
    Boston,
    Markham,
    Oakville,
    Peterborough,
}

impl City {
    pub const ALL: [City; 9] = [
        City::Toronto,
        City::Ottawa,
        City::Montreal,
        City::Calgary,
        City::Waterloo,
        City::Boston,
        City::Markham,
        City::Oakville,
        City::Peterborough,
    ];

    pub fn parse(value: &str) -> Option<City> {
        match value.trim().to_ascii_lowercase().as_str() {
            "toronto" => Some(City::Toronto),
            "ottawa" => Some(City::Ottawa),
            "montreal" => Some(City::Montreal),
            "calgary" => Some(City::Calgary),
            "waterloo" => Some(City::Waterloo),
            "boston" => Some(City::Boston),
            "markham" => Some(City::Markham),
            "oakville" => Some(City::Oakville),
            "peterborough" => Some(City::Peterborough),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            City::Toronto => "toronto",
            City::Ottawa => "ottawa",
            City::Montreal => "montreal",
            City::Calgary => "calgary",
            City::Waterloo => "waterloo",
            City::Boston => "boston",
            City::Markham => "markham",
            City::Oakville => "oakville",
            City::Peterborough => "peterborough",
        }
    }

    /// The canonical `source` value stored with every row of this dataset.
    pub fn source_name(&self) -> &'static str {
        match self {
            City::Toronto => "Toronto Open Data Street Trees",
            City::Ottawa => "Ottawa Open Data Tree Inventory",
            City::Montreal => "Montreal Open Data Tree Inventory",
            City::Calgary => "Calgary Open Data Tree Inventory",
            City::Waterloo => "Waterloo Open Data Tree Inventory",
            City::Boston => "Boston Open Data Tree Inventory",
            City::Markham => "Markham Open Data Street Trees",
            City::Oakville => "Oakville Parks Tree Forestry",
            City::Peterborough => "Peterborough Open Data Tree Inventory",
        }
    }

    pub fn enrichments(&self) -> &'static [Enrichment] {
        match self {
            City::Toronto => &[Enrichment::WikipediaLinks, Enrichment::HumanReadableNames],
            City::Ottawa | City::Montreal | City::Calgary => &[Enrichment::WikipediaLinks],
            _ => &[],
        }
    }
}

impl std::fmt::Display for City {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
