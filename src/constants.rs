/// Column identifiers, table names and fixed reference data shared across the
/// pipeline stages. Column names are the lower-camel-case form produced by the
/// field normalizer.

// Customer attributes
pub const NUMBER: &str = "number";
pub const NUMBER2: &str = "number2";
pub const NAME: &str = "name";
pub const GENDER: &str = "gender";
pub const DATE_OF_BIRTH: &str = "dateOfBirth";
pub const ACCOUNT_TYPE: &str = "accountType";
pub const BRANCH: &str = "branch";
pub const PROFILE_ID: &str = "profileId";
pub const CUSTOMER_ID: &str = "customerId";

// Complaint attributes
pub const LOCATION: &str = "location";
pub const REGION: &str = "region";
pub const LOG_DATE: &str = "logDate";
pub const COMPLAINT_SOURCE: &str = "complaintSource";
pub const NATURE_OF_COMPLAINT: &str = "natureOfComplaint";
pub const SUBJECT: &str = "subject";
pub const DETAILS_OF_COMPLAINT: &str = "detailsOfComplaint";
pub const COMMENT: &str = "comment";
pub const UPDATES: &str = "updates";
pub const STATUS: &str = "status";
pub const TURNAROUND_TIME: &str = "turnaroundTime";
pub const RESOLUTION_DATE: &str = "resolutionDate";
pub const REASON_FOR_REVERSAL_REQUEST: &str = "reasonForReversalRequest";
pub const ASSIGN: &str = "assign";
pub const NAME_OF_CC_REP: &str = "nameOfCcRep";

// Registry attributes
pub const PHONE_NUMBER: &str = "phoneNumber";
pub const PHONE_NUMBER2: &str = "phoneNumber2";

// Tables
pub const RAW_TABLE: &str = "customer_support";
pub const CUSTOMERS_TABLE: &str = "customers";
pub const COMPLAINTS_TABLE: &str = "complaints";
pub const CLIENT_REGISTRY_TABLE: &str = "client";
pub const COMPLAINTS_CUSTOMER_FK: &str = "fk_complaints_customer";

/// Sentinel written in place of missing names and unmatched regions.
pub const UNKNOWN: &str = "Unknown";

/// Placeholder spellings that count as "no value" in free-text cells.
pub const NULL_SPELLINGS: [&str; 4] = ["", "nan", "none", "null"];

pub const COUNTRY_CODE: &str = "233";

/// Minimum token-set similarity (0-100, insert/delete based) for a region to
/// be accepted.
pub const REGION_MATCH_THRESHOLD: f64 = 80.0;

/// Canonical administrative regions. Order is significant: equal top scores
/// resolve to the earliest entry.
pub const VALID_REGIONS: [&str; 16] = [
    "Ashanti Region",
    "Greater Accra Region",
    "Northern Region",
    "Volta Region",
    "Central Region",
    "Western Region",
    "Upper West Region",
    "Upper East Region",
    "Oti Region",
    "Savannah Region",
    "Bono East Region",
    "Western North Region",
    "Brong Ahafo Region",
    "North East Region",
    "Ahafo Region",
    "Eastern Region",
];

/// Legacy column names renamed after lower-camel-casing.
pub const COLUMN_ALIASES: [(&str, &str); 2] = [("tat", TURNAROUND_TIME), ("dob", DATE_OF_BIRTH)];

/// Text columns that are trimmed but never case-transformed. Any column whose
/// name ends in `Id` is treated the same way.
pub const CASE_PRESERVED_COLUMNS: [&str; 3] = [NUMBER, NUMBER2, BRANCH];

pub const DATE_COLUMNS: [&str; 3] = [LOG_DATE, RESOLUTION_DATE, DATE_OF_BIRTH];

pub const TAT_COLUMNS: [&str; 3] = [LOG_DATE, RESOLUTION_DATE, TURNAROUND_TIME];

pub const DEFAULT_EXCLUDED_SHEETS: [&str; 1] = ["Unresolved"];

/// Columns projected out of the merged extract into the customer set.
pub const CUSTOMER_SOURCE_COLUMNS: [&str; 6] = [NUMBER, NAME, GENDER, DATE_OF_BIRTH, ACCOUNT_TYPE, BRANCH];

/// Columns projected out of the merged extract into the complaint set.
pub const COMPLAINT_SOURCE_COLUMNS: [&str; 16] = [
    NUMBER,
    LOCATION,
    REGION,
    LOG_DATE,
    COMPLAINT_SOURCE,
    NATURE_OF_COMPLAINT,
    SUBJECT,
    DETAILS_OF_COMPLAINT,
    COMMENT,
    UPDATES,
    STATUS,
    TURNAROUND_TIME,
    RESOLUTION_DATE,
    REASON_FOR_REVERSAL_REQUEST,
    ASSIGN,
    NAME_OF_CC_REP,
];

/// Persisted column order of the customers table.
pub const CUSTOMER_COLUMNS: [&str; 9] = [
    CUSTOMER_ID,
    PROFILE_ID,
    NAME,
    NUMBER,
    NUMBER2,
    GENDER,
    DATE_OF_BIRTH,
    ACCOUNT_TYPE,
    BRANCH,
];

/// Persisted column order of the complaints table.
pub const COMPLAINT_COLUMNS: [&str; 19] = [
    CUSTOMER_ID,
    PROFILE_ID,
    NUMBER,
    NUMBER2,
    LOCATION,
    REGION,
    COMPLAINT_SOURCE,
    NATURE_OF_COMPLAINT,
    SUBJECT,
    DETAILS_OF_COMPLAINT,
    COMMENT,
    UPDATES,
    STATUS,
    LOG_DATE,
    TURNAROUND_TIME,
    RESOLUTION_DATE,
    REASON_FOR_REVERSAL_REQUEST,
    ASSIGN,
    NAME_OF_CC_REP,
];

/// Columns that must be non-null once the dataset is final.
pub const REQUIRED_CUSTOMER_COLUMNS: [&str; 3] = [NUMBER, NAME, CUSTOMER_ID];
pub const REQUIRED_COMPLAINT_COLUMNS: [&str; 2] = [LOG_DATE, CUSTOMER_ID];
