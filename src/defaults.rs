//! The built-in ignore set (spec §4.2): "VCS metadata, language build
//! artifacts, editor caches, lockfiles for dependency trees, minified
//! assets, and common binary extensions." Part of the public contract —
//! enumerated here in one listing, same shape as the teacher's
//! `DEFAULT_IGNORE_PATTERNS`.

pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    // Lock files
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Cargo.lock",
    "Gemfile.lock",
    "composer.lock",
    "poetry.lock",
    "Pipfile.lock",
    "flake.lock",
    // Build output
    "node_modules/**",
    "target/**",
    "dist/**",
    "build/**",
    ".next/**",
    "__pycache__/**",
    "*.pyc",
    // VCS / IDE
    ".git/**",
    ".svn/**",
    ".idea/**",
    ".vscode/**",
    "*.swp",
    "*.swo",
    ".DS_Store",
    // Images
    "*.png",
    "*.jpg",
    "*.jpeg",
    "*.gif",
    "*.ico",
    "*.svg",
    "*.webp",
    "*.bmp",
    // Fonts
    "*.woff",
    "*.woff2",
    "*.ttf",
    "*.otf",
    "*.eot",
    // Archives / binaries
    "*.zip",
    "*.tar",
    "*.gz",
    "*.bz2",
    "*.xz",
    "*.7z",
    "*.rar",
    "*.exe",
    "*.dll",
    "*.so",
    "*.dylib",
    "*.o",
    "*.a",
    "*.class",
    "*.jar",
    "*.war",
    "*.wasm",
    // Generated / minified
    "*.min.js",
    "*.min.css",
    "*.map",
    "*.bundle.js",
    // Data
    "*.sqlite",
    "*.db",
    "*.pdf",
];
