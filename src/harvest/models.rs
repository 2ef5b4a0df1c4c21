/// Flattened listing fields from one page item. The identifier is the only
/// field the pipeline relies on; everything else is carried through to the
/// output as-is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryRecord {
    pub id: String,
    pub url: String,
    pub price: Option<String>,
    pub currency: Option<String>,
    pub rooms: Option<u64>,
    pub area: Option<String>,
    pub area_units: Option<String>,
    pub location: Option<String>,
    pub city: Option<String>,
    pub updated_at: Option<String>,
    pub photos_count: Option<u64>,
}

/// Additional fields only present on the per-item detail query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailRecord {
    pub description: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub contact_name: Option<String>,
    /// Comma-and-space-joined non-empty phone numbers.
    pub phones: Option<String>,
    pub category: Option<String>,
    pub has_deed: bool,
    pub has_repair: bool,
    /// `"<floor>/<floors>"`, only when the source carries both parts.
    pub floor: Option<String>,
}

const SUMMARY_COLUMNS: [&str; 11] = [
    "id",
    "url",
    "price",
    "currency",
    "rooms",
    "area",
    "area_units",
    "location",
    "city",
    "updated_at",
    "photos_count",
];

// Column names match the site's own export vocabulary:
// Çıxarış = deed, Təmir = renovation, Mərtəbə = floor.
const DETAIL_COLUMNS: [&str; 10] = [
    "description",
    "address",
    "latitude",
    "longitude",
    "contact_name",
    "phones",
    "category",
    "Çıxarış",
    "Təmir",
    "Mərtəbə",
];

/// One output row: a summary plus, at most once, its merged detail.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedRecord {
    pub summary: SummaryRecord,
    pub detail: Option<DetailRecord>,
}

impl MergedRecord {
    pub fn from_summary(summary: SummaryRecord) -> Self {
        Self {
            summary,
            detail: None,
        }
    }

    pub fn merge_detail(mut self, detail: DetailRecord) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn id(&self) -> &str {
        &self.summary.id
    }

    /// Column names this record carries; detail columns only appear once a
    /// detail has been merged.
    pub fn columns(&self) -> Vec<&'static str> {
        let mut columns = SUMMARY_COLUMNS.to_vec();
        if self.detail.is_some() {
            columns.extend(DETAIL_COLUMNS);
        }
        columns
    }

    /// Rendered `(column, value)` pairs in column order.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let s = &self.summary;
        let mut fields = vec![
            ("id", s.id.clone()),
            ("url", s.url.clone()),
            ("price", render(&s.price)),
            ("currency", render(&s.currency)),
            ("rooms", render(&s.rooms)),
            ("area", render(&s.area)),
            ("area_units", render(&s.area_units)),
            ("location", render(&s.location)),
            ("city", render(&s.city)),
            ("updated_at", render(&s.updated_at)),
            ("photos_count", render(&s.photos_count)),
        ];
        if let Some(d) = &self.detail {
            fields.extend([
                ("description", render(&d.description)),
                ("address", render(&d.address)),
                ("latitude", render(&d.latitude)),
                ("longitude", render(&d.longitude)),
                ("contact_name", render(&d.contact_name)),
                ("phones", render(&d.phones)),
                ("category", render(&d.category)),
                ("Çıxarış", yes_no(d.has_deed)),
                ("Təmir", yes_no(d.has_repair)),
                ("Mərtəbə", render(&d.floor)),
            ]);
        }
        fields
    }
}

fn render<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(T::to_string).unwrap_or_default()
}

fn yes_no(flag: bool) -> String {
    if flag { "Yes" } else { "No" }.to_string()
}
