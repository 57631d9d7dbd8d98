use crate::dto::HealthRes;

/// Simple health service shared by the REST server and the runner binary.
#[derive(Clone, Debug, Default)]
pub struct HealthService;

impl HealthService {
    pub fn new() -> Self {
        Self
    }

    /// Static health check; preferred since it needs no instance.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "ImgVault is alive".into(),
        }
    }
}
