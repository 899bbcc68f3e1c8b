/// Column and file defaults for the employee sample export.
/// These define the cleaning rules applied when no configuration overrides them.

// Source file
pub const DEFAULT_SOURCE_FILE: &str = "employee_sample_data.csv";
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

// Columns with special handling
pub const EMPLOYEE_ID_COLUMN: &str = "Employee_ID";
pub const ANNUAL_SALARY_COLUMN: &str = "Annual Salary";
pub const BONUS_PERCENT_COLUMN: &str = "Bonus %";
pub const AGE_COLUMN: &str = "Age";
pub const DEPARTMENT_COLUMN: &str = "Department";
pub const GENDER_COLUMN: &str = "Gender";

/// Categorical columns whose missing cells become the sentinel string
pub const SENTINEL_FILLED_COLUMNS: &[&str] = &["Business Unit", "Gender", "Exit Date", "Job Title"];

/// Placeholder for any value still missing after the configured fills
pub const UNKNOWN_SENTINEL: &str = "Unknown";

/// Suffix selecting the unanalyzed (exact-match) sub-field of a text field
pub const KEYWORD_SUFFIX: &str = ".keyword";
pub const DEFAULT_FACET_SIZE: u32 = 10;

/// Cell texts treated as missing when reading the CSV, matching the usual
/// dataframe loader defaults.
pub const DEFAULT_NA_VALUES: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

// Demo driver defaults
pub const DEMO_NAME_COLLECTION: &str = "hash_john_doe";
pub const DEMO_PHONE_COLLECTION: &str = "hash_1234";
pub const DEMO_DELETE_EMPLOYEE_ID: &str = "E02003";
