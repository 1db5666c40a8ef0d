pub mod field;
pub mod field_template;
pub mod form;
pub mod refresh_token;
pub mod submission;
pub mod tenant;
pub mod user;

pub use field::{Field, FieldInput, FieldPatch, FieldType};
pub use field_template::{FieldTemplate, FieldTemplateInput, FieldTemplatePatch};
pub use form::{CreateFormRequest, Form, FormDetail, FormPatch, NewForm, PublicForm, UpdateFormRequest};
pub use refresh_token::RefreshToken;
pub use submission::{data_contains, DailyCount, NewSubmission, Page, PageRequest, Submission, ValueCount};
pub use tenant::{CreateTenantRequest, Tenant, TenantPatch, TenantWithKey};
pub use user::{CreateUserRequest, NewUser, Role, UpdateUserRequest, User, UserPatch};
