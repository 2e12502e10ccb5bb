//! Canonical (normalized) column names of the officials and towns datasets.

pub const DEPARTMENT_CODE: &str = "code_du_departement";
pub const DEPARTMENT_NAME: &str = "libelle_du_departement";
pub const COLLECTIVITY_CODE: &str = "code_de_la_collectivite_a_statut_particulier";
pub const COLLECTIVITY_NAME: &str = "libelle_de_la_collectivite_a_statut_particulier";
pub const TOWN_CODE: &str = "code_de_la_commune";
pub const TOWN_NAME: &str = "libelle_de_la_commune";
pub const SECTOR: &str = "libelle_du_secteur";
pub const LAST_NAME: &str = "nom_de_l_elu";
pub const FIRST_NAME: &str = "prenom_de_l_elu";
pub const GENDER_CODE: &str = "code_sexe";
pub const BIRTHDATE: &str = "date_de_naissance";
pub const BIRTHPLACE: &str = "lieu_de_naissance";
pub const SOCIOPRO_CODE: &str = "code_de_la_categorie_socio_professionnelle";
pub const SOCIOPRO_LABEL: &str = "libelle_de_la_categorie_socio_professionnelle";
pub const MANDATE_START: &str = "date_de_debut_du_mandat";
pub const FUNCTION_LABEL: &str = "libelle_de_la_fonction";
pub const FUNCTION_START: &str = "date_de_debut_de_la_fonction";

/// Derived by the loader: department code, else collectivity code.
pub const TERRITORY_CODE: &str = "code_territoire";

pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";

/// Town code column as published in the towns dataset, before renaming.
pub const INSEE_TOWN_CODE: &str = "code_commune_insee";

/// Width of an INSEE commune code.
pub const TOWN_CODE_WIDTH: usize = 5;
