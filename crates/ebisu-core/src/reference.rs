//! Country reference data and flag-text resolution.
//!
//! Registries report flags as free text: ISO codes of either length, numeric
//! codes, or a display name. [`CountryResolver`] maps all of these to the
//! canonical alpha-3 code.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One ISO 3166-1 entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
  pub alpha2:  String,
  pub alpha3:  String,
  pub numeric: String,
  pub name:    String,
}

impl Country {
  pub fn new(alpha2: &str, alpha3: &str, numeric: &str, name: &str) -> Self {
    Self {
      alpha2:  alpha2.to_owned(),
      alpha3:  alpha3.to_owned(),
      numeric: numeric.to_owned(),
      name:    name.to_owned(),
    }
  }

  /// The code stored on entities and in FLAG history.
  pub fn code(&self) -> &str { &self.alpha3 }
}

/// Case-insensitive lookup over a set of countries.
///
/// Keys are tried in a fixed order (alpha-2, alpha-3, numeric, then display
/// name) and the first hit wins.
#[derive(Debug, Clone, Default)]
pub struct CountryResolver {
  countries:  Vec<Country>,
  by_alpha2:  HashMap<String, usize>,
  by_alpha3:  HashMap<String, usize>,
  by_numeric: HashMap<String, usize>,
  by_name:    HashMap<String, usize>,
}

impl CountryResolver {
  pub fn new(countries: impl IntoIterator<Item = Country>) -> Self {
    let mut resolver = Self::default();
    for country in countries {
      let idx = resolver.countries.len();
      // Earlier entries win on duplicate keys.
      resolver.by_alpha2.entry(fold(&country.alpha2)).or_insert(idx);
      resolver.by_alpha3.entry(fold(&country.alpha3)).or_insert(idx);
      resolver.by_numeric.entry(fold(&country.numeric)).or_insert(idx);
      resolver.by_name.entry(fold(&country.name)).or_insert(idx);
      resolver.countries.push(country);
    }
    resolver
  }

  /// Resolver over [`builtin_countries`].
  pub fn builtin() -> Self { Self::new(builtin_countries()) }

  pub fn resolve(&self, text: &str) -> Option<&Country> {
    let key = fold(text);
    if key.is_empty() {
      return None;
    }
    [&self.by_alpha2, &self.by_alpha3, &self.by_numeric, &self.by_name]
      .into_iter()
      .find_map(|index| index.get(&key))
      .map(|&idx| &self.countries[idx])
  }

  pub fn countries(&self) -> &[Country] { &self.countries }
}

fn fold(s: &str) -> String { s.trim().to_lowercase() }

/// Flag states seeded into a fresh store.
pub fn builtin_countries() -> Vec<Country> {
  BUILTIN
    .iter()
    .map(|(a2, a3, num, name)| Country::new(a2, a3, num, name))
    .collect()
}

const BUILTIN: &[(&str, &str, &str, &str)] = &[
  ("AG", "ATG", "028", "Antigua and Barbuda"),
  ("AO", "AGO", "024", "Angola"),
  ("AR", "ARG", "032", "Argentina"),
  ("AU", "AUS", "036", "Australia"),
  ("BB", "BRB", "052", "Barbados"),
  ("BD", "BGD", "050", "Bangladesh"),
  ("BE", "BEL", "056", "Belgium"),
  ("BS", "BHS", "044", "Bahamas"),
  ("BZ", "BLZ", "084", "Belize"),
  ("BR", "BRA", "076", "Brazil"),
  ("CA", "CAN", "124", "Canada"),
  ("CI", "CIV", "384", "Cote d'Ivoire"),
  ("CL", "CHL", "152", "Chile"),
  ("CM", "CMR", "120", "Cameroon"),
  ("CN", "CHN", "156", "China"),
  ("CO", "COL", "170", "Colombia"),
  ("CK", "COK", "184", "Cook Islands"),
  ("CR", "CRI", "188", "Costa Rica"),
  ("CU", "CUB", "192", "Cuba"),
  ("CV", "CPV", "132", "Cabo Verde"),
  ("CY", "CYP", "196", "Cyprus"),
  ("DE", "DEU", "276", "Germany"),
  ("DK", "DNK", "208", "Denmark"),
  ("DZ", "DZA", "012", "Algeria"),
  ("EC", "ECU", "218", "Ecuador"),
  ("EE", "EST", "233", "Estonia"),
  ("EG", "EGY", "818", "Egypt"),
  ("ES", "ESP", "724", "Spain"),
  ("FJ", "FJI", "242", "Fiji"),
  ("FI", "FIN", "246", "Finland"),
  ("FM", "FSM", "583", "Micronesia"),
  ("FO", "FRO", "234", "Faroe Islands"),
  ("FR", "FRA", "250", "France"),
  ("GA", "GAB", "266", "Gabon"),
  ("GB", "GBR", "826", "United Kingdom"),
  ("GH", "GHA", "288", "Ghana"),
  ("GL", "GRL", "304", "Greenland"),
  ("GN", "GIN", "324", "Guinea"),
  ("GQ", "GNQ", "226", "Equatorial Guinea"),
  ("GR", "GRC", "300", "Greece"),
  ("GT", "GTM", "320", "Guatemala"),
  ("HN", "HND", "340", "Honduras"),
  ("HR", "HRV", "191", "Croatia"),
  ("ID", "IDN", "360", "Indonesia"),
  ("IE", "IRL", "372", "Ireland"),
  ("IN", "IND", "356", "India"),
  ("IR", "IRN", "364", "Iran"),
  ("IS", "ISL", "352", "Iceland"),
  ("IT", "ITA", "380", "Italy"),
  ("JP", "JPN", "392", "Japan"),
  ("KE", "KEN", "404", "Kenya"),
  ("KI", "KIR", "296", "Kiribati"),
  ("KM", "COM", "174", "Comoros"),
  ("KN", "KNA", "659", "Saint Kitts and Nevis"),
  ("KR", "KOR", "410", "Korea, Republic of"),
  ("LB", "LBN", "422", "Lebanon"),
  ("LK", "LKA", "144", "Sri Lanka"),
  ("LR", "LBR", "430", "Liberia"),
  ("LT", "LTU", "440", "Lithuania"),
  ("LV", "LVA", "428", "Latvia"),
  ("LY", "LBY", "434", "Libya"),
  ("MA", "MAR", "504", "Morocco"),
  ("MG", "MDG", "450", "Madagascar"),
  ("MH", "MHL", "584", "Marshall Islands"),
  ("MR", "MRT", "478", "Mauritania"),
  ("MT", "MLT", "470", "Malta"),
  ("MU", "MUS", "480", "Mauritius"),
  ("MV", "MDV", "462", "Maldives"),
  ("MX", "MEX", "484", "Mexico"),
  ("MY", "MYS", "458", "Malaysia"),
  ("MZ", "MOZ", "508", "Mozambique"),
  ("NA", "NAM", "516", "Namibia"),
  ("NG", "NGA", "566", "Nigeria"),
  ("NI", "NIC", "558", "Nicaragua"),
  ("NL", "NLD", "528", "Netherlands"),
  ("NO", "NOR", "578", "Norway"),
  ("NR", "NRU", "520", "Nauru"),
  ("NZ", "NZL", "554", "New Zealand"),
  ("OM", "OMN", "512", "Oman"),
  ("PA", "PAN", "591", "Panama"),
  ("PE", "PER", "604", "Peru"),
  ("PG", "PNG", "598", "Papua New Guinea"),
  ("PH", "PHL", "608", "Philippines"),
  ("PK", "PAK", "586", "Pakistan"),
  ("PL", "POL", "616", "Poland"),
  ("PT", "PRT", "620", "Portugal"),
  ("PW", "PLW", "585", "Palau"),
  ("RU", "RUS", "643", "Russian Federation"),
  ("SB", "SLB", "090", "Solomon Islands"),
  ("SC", "SYC", "690", "Seychelles"),
  ("SE", "SWE", "752", "Sweden"),
  ("SL", "SLE", "694", "Sierra Leone"),
  ("SN", "SEN", "686", "Senegal"),
  ("ST", "STP", "678", "Sao Tome and Principe"),
  ("SV", "SLV", "222", "El Salvador"),
  ("TG", "TGO", "768", "Togo"),
  ("TH", "THA", "764", "Thailand"),
  ("TN", "TUN", "788", "Tunisia"),
  ("TO", "TON", "776", "Tonga"),
  ("TR", "TUR", "792", "Turkey"),
  ("TT", "TTO", "780", "Trinidad and Tobago"),
  ("TV", "TUV", "798", "Tuvalu"),
  ("TW", "TWN", "158", "Taiwan"),
  ("TZ", "TZA", "834", "Tanzania"),
  ("UA", "UKR", "804", "Ukraine"),
  ("US", "USA", "840", "United States"),
  ("UY", "URY", "858", "Uruguay"),
  ("VC", "VCT", "670", "Saint Vincent and the Grenadines"),
  ("VE", "VEN", "862", "Venezuela"),
  ("VN", "VNM", "704", "Viet Nam"),
  ("VU", "VUT", "548", "Vanuatu"),
  ("WS", "WSM", "882", "Samoa"),
  ("ZA", "ZAF", "710", "South Africa"),
];
