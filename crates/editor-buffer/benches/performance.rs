use criterion::{
    BatchSize, BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main,
};
use editor_buffer::{Bias, CancelToken, Document, Scanned, Scanner};

/// Words and separators; the state tracks whether a `/*` comment is open.
struct CommentScanner {
    in_comment: bool,
}

impl Scanner for CommentScanner {
    type State = bool;
    type Kind = u8;

    fn initial_state(&self) -> bool {
        false
    }

    fn load_state(&mut self, state: &bool) {
        self.in_comment = *state;
    }

    fn store_state(&self) -> bool {
        self.in_comment
    }

    fn next_token(&mut self, buffer: &[char], offset: usize, _last: bool) -> Scanned<u8> {
        let rest = &buffer[offset..];
        match rest {
            [] => Scanned::EndOfBuffer,
            ['/', '*', ..] => {
                self.in_comment = true;
                Scanned::Token { kind: 2, len: 2 }
            }
            ['*', '/', ..] => {
                self.in_comment = false;
                Scanned::Token { kind: 2, len: 2 }
            }
            [c, ..] if c.is_alphanumeric() => {
                let len = rest.iter().take_while(|c| c.is_alphanumeric()).count();
                Scanned::Token { kind: 1, len }
            }
            _ => Scanned::Token { kind: 0, len: 1 },
        }
    }
}

fn large_text(line_count: usize) -> String {
    let mut out = String::with_capacity(line_count * 64);
    for i in 0..line_count {
        out.push_str(&format!(
            "{i:06} the quick brown fox jumps over the lazy dog (editor-buffer benchmark line)\n"
        ));
    }
    out.pop();
    out
}

fn open(text: &str) -> Document<CommentScanner> {
    Document::new(text, CommentScanner { in_comment: false })
}

fn bench_large_file_open(c: &mut Criterion) {
    let text = large_text(50_000);
    c.bench_function("large_file_open/50k_lines", |b| {
        b.iter(|| {
            let doc = open(black_box(&text));
            black_box(doc.line_count());
        })
    });
}

fn bench_typing_in_middle(c: &mut Criterion) {
    let text = large_text(50_000);
    c.bench_function("typing_middle/100_inserts", |b| {
        b.iter_batched(
            || {
                let doc = open(&text);
                // Marks spread over the document so every insert has marks to move.
                let marks: Vec<_> = (0..doc.line_count())
                    .step_by(50)
                    .filter_map(|line| doc.line_range(line))
                    .filter_map(|(start, _)| doc.create_mark(start, Bias::StayBefore).ok())
                    .collect();
                (doc, marks)
            },
            |(doc, marks)| {
                let mut offset = doc.len() / 2;
                for _ in 0..100 {
                    doc.insert(offset, "x").unwrap();
                    offset += 1;
                }
                black_box(doc.len());
                (doc, marks)
            },
            BatchSize::LargeInput,
        )
    });
}

fn bench_incremental_rescan(c: &mut Criterion) {
    let text = large_text(50_000);
    let doc = open(&text);
    let last = doc.line_count() - 1;
    doc.tokens(0..=last, &CancelToken::new()).unwrap();

    let line = 25_000;
    c.bench_function("incremental_rescan/edit_one_line", |b| {
        b.iter(|| {
            let (start, _) = doc.line_range(line).unwrap();
            doc.insert(start + 7, "z").unwrap();
            let tokens = doc.tokens(line..=line + 60, &CancelToken::new()).unwrap();
            doc.remove(start + 7, 1).unwrap();
            black_box(tokens.report.lines_scanned);
        })
    });
}

fn bench_full_scan(c: &mut Criterion) {
    // Per-line throughput should stay flat as the document grows.
    let mut group = c.benchmark_group("full_scan");
    group.sample_size(10);
    for line_count in [10_000, 40_000] {
        let text = large_text(line_count);
        group.throughput(Throughput::Elements(line_count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(line_count), &text, |b, text| {
            b.iter_batched(
                || open(text),
                |doc| {
                    let tokens = doc.all_tokens().unwrap();
                    black_box(tokens.len());
                },
                BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_large_file_open,
    bench_typing_in_middle,
    bench_incremental_rescan,
    bench_full_scan
);
criterion_main!(benches);
