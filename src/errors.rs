use error_chain::error_chain;
use std::path::PathBuf;

error_chain! {
    foreign_links {
        Io(std::io::Error);
        HttpRequest(reqwest::Error);
    }

    errors {
        InputFile(path: PathBuf) {
            description("package list could not be read")
            display("couldn't read package list '{}'", path.display())
        }
        MalformedLine(line: usize, content: String) {
            description("malformed package list line")
            display("line {}: malformed entry '{}' (expected 'name' or 'name | directory')", line, content)
        }
        InvalidIdentifier(line: usize, name: String) {
            description("invalid package identifier")
            display("line {}: '{}' is not a valid package identifier", line, name)
        }
        CatalogFetch(url: String) {
            description("catalog could not be fetched")
            display("couldn't fetch catalog from {}", url)
        }
        CatalogParse(reason: String) {
            description("catalog is not well-formed")
            display("couldn't parse catalog: {}", reason)
        }
        OutputDir(path: PathBuf) {
            description("output directory could not be created")
            display("couldn't create output directory '{}'", path.display())
        }
        DuplicateTarget(path: PathBuf) {
            description("download target already taken")
            display("another package in this batch already writes '{}'", path.display())
        }
        ReadTimeout(url: String, secs: u64) {
            description("download stalled")
            display("no data from {} for {}s", url, secs)
        }
    }
}
