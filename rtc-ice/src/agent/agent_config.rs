/// Collects the arguments to `ice::Agent` construction into a single structure, for
/// future-proofness of the interface.
#[derive(Debug, Clone, Default)]
pub struct AgentConfig {
    /// It is used to perform connectivity checks. The values MUST be unguessable, with at least
    /// 128 bits of random number generator output used to generate the password, and at least 24
    /// bits of output to generate the username fragment.
    pub local_ufrag: String,
    /// It is used to perform connectivity checks. The values MUST be unguessable, with at least
    /// 128 bits of random number generator output used to generate the password, and at least 24
    /// bits of output to generate the username fragment.
    pub local_pwd: String,

    /// Set when `local_ufrag`/`local_pwd` were already issued to a remote peer by an earlier
    /// agent. Only non-emptiness is checked then.
    pub credentials_restored: bool,

    /// Lower bound of the UDP port range the host candidate must lie in. 0/0 means any.
    pub port_min: u16,
    /// Upper bound of the UDP port range the host candidate must lie in.
    pub port_max: u16,

    pub is_controlling: bool,

    /// lite agents do not perform connectivity check and only provide host candidates.
    pub lite: bool,
}
