//! Where each field lives on each intranet page.
//!
//! When the markup drifts, this is the file to update. Ids are matched by
//! suffix (`[id$=...]`) because ASP.NET prefixes them with the naming
//! container chain (`ctl00_ctl00_MainContent_...`), which moves whenever a
//! page template is reshuffled.

use crate::models::field;

/// How records are laid out on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// One record per page, fields searched under `root`.
    Page { root: &'static str },
    /// One record per table row; `Column` locators resolve through `header`.
    Table {
        table: &'static str,
        header: &'static str,
        rows: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator {
    /// First element matching the selector inside the record region.
    Css(&'static str),
    /// Table cell under the header whose label matches (case/accent-insensitive).
    Column(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Text,
    /// A query parameter of the URL held in `attr`, resolved against the page.
    QueryParam {
        attr: &'static str,
        param: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    /// Record key: a region without it is not a record.
    Identity,
    Optional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub locator: Locator,
    pub value: ValueSource,
    pub role: FieldRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    pub name: &'static str,
    pub layout: Layout,
    pub fields: &'static [FieldSpec],
}

impl Schema {
    pub fn identity_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.role == FieldRole::Identity)
    }
}

const fn css(
    name: &'static str,
    sel: &'static str,
    value: ValueSource,
    role: FieldRole,
) -> FieldSpec {
    FieldSpec {
        name,
        locator: Locator::Css(sel),
        value,
        role,
    }
}

const fn col(
    name: &'static str,
    label: &'static str,
    value: ValueSource,
    role: FieldRole,
) -> FieldSpec {
    FieldSpec {
        name,
        locator: Locator::Column(label),
        value,
        role,
    }
}

const ID_PARAM: ValueSource = ValueSource::QueryParam {
    attr: "href",
    param: "id",
};

/// Any logged-in page: the header logo links to the member's own record.
pub const HOME: Schema = Schema {
    name: "home",
    layout: Layout::Page { root: "body" },
    fields: &[css(
        field::IID,
        r#"a[id$="_hlVoirFicherAdherentLogo"]"#,
        ID_PARAM,
        FieldRole::Identity,
    )],
};

/// `adherents/ResumeAdherent.aspx`: one member's summary tab.
pub const ADHERENT_SUMMARY: Schema = Schema {
    name: "adherent summary",
    layout: Layout::Page { root: "body" },
    fields: &[
        css(
            field::IID,
            "form#aspnetForm",
            ValueSource::QueryParam {
                attr: "action",
                param: "id",
            },
            FieldRole::Identity,
        ),
        css(field::FULL_NAME, r#"span[id$="__divTitre"]"#, ValueSource::Text, FieldRole::Optional),
        css(field::CODE, r#"span[id$="_lblCodeAdherent"]"#, ValueSource::Text, FieldRole::Optional),
        css(
            field::STATUS,
            r#"span[id$="_lblTypeInscription"]"#,
            ValueSource::Text,
            FieldRole::Optional,
        ),
        css(field::GROUP, r#"a[id$="_hlStructure"]"#, ValueSource::Text, FieldRole::Optional),
        css(field::FUNCTION, r#"span[id$="_lblFonction"]"#, ValueSource::Text, FieldRole::Optional),
        css(
            field::FUNCTION_START,
            r#"span[id$="_lblDebutFonction"]"#,
            ValueSource::Text,
            FieldRole::Optional,
        ),
        css(
            field::FUNCTION_END,
            r#"span[id$="_lblFinFonction"]"#,
            ValueSource::Text,
            FieldRole::Optional,
        ),
    ],
};

/// `adherents/RechercherAdherent.aspx` results grid.
pub const ROSTER: Schema = Schema {
    name: "roster",
    layout: Layout::Table {
        table: r#"table[id$="_gvResultats"]"#,
        header: "tr.entete th",
        rows: r#"tr[class^="ligne"]"#,
    },
    fields: &[
        col(field::IID, "Nom, Prénom", ID_PARAM, FieldRole::Identity),
        col(field::FULL_NAME, "Nom, Prénom", ValueSource::Text, FieldRole::Optional),
        col(field::CODE, "N° Adhérent", ValueSource::Text, FieldRole::Optional),
        col(field::FUNCTION, "Fonction", ValueSource::Text, FieldRole::Optional),
        col(field::GROUP, "Structure", ValueSource::Text, FieldRole::Optional),
        col(field::FUNCTION_END, "Fin Fonction", ValueSource::Text, FieldRole::Optional),
        col(field::POSTCODE, "CP", ValueSource::Text, FieldRole::Optional),
        col(field::CITY, "Ville", ValueSource::Text, FieldRole::Optional),
        col(field::MEMBERSHIP_END, "Fin Adhésion", ValueSource::Text, FieldRole::Optional),
    ],
};
