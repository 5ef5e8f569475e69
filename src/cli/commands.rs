use clap::{Args, Subcommand};

#[derive(Args, Clone, Debug)]
pub struct ProbeArgs {
    /// Descriptor URL; defaults to https://CUSTOM_DOMAIN/.well-known/assetlinks.json
    #[arg(long)]
    pub url: Option<String>,

    /// Expected package; defaults to PACKAGE_NAME
    #[arg(long)]
    pub package: Option<String>,

    /// Number of requests before giving up
    #[arg(long, default_value_t = 1)]
    pub attempts: u32,

    /// Seconds between requests
    #[arg(long, default_value_t = 5)]
    pub interval_secs: u64,
}

#[derive(Args, Clone, Debug)]
pub struct LoginArgs {
    /// Seconds to wait for the sign-in to complete
    #[arg(long, default_value_t = 120)]
    pub timeout_secs: u64,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Sign in to the Play Console by hand and save the session
    Login(LoginArgs),

    /// Sign in to GitHub by hand and save the session
    GithubLogin(LoginArgs),

    /// Create a closed-testing release and upload the app bundle
    ClosedRelease,

    /// Fill the main store listing and check that it saved
    StoreListing,

    /// Fill the main store listing including the default language
    Listing,

    /// Set pricing and distribution countries
    Pricing,

    /// Answer the app content declarations
    AppContent,

    /// Configure the GitHub Pages custom domain and HTTPS
    PagesDomain,

    /// Recheck the app links domain and wait for the verdict
    VerifyAppLinks,

    /// Print the verification status of the app links domain
    AppLinksStatus,

    /// Check the Digital Asset Links file over HTTP
    ProbeAssetlinks(ProbeArgs),

    /// Show the effective configuration
    Config,
}
