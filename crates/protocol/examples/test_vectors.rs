//! Generate test vectors for client interop testing.
//!
//! Run with: cargo run --package protocol --example test_vectors

use protocol::events::*;

fn main() {
    // Test vector 1: Run request
    let run = Envelope::new(
        1,
        Event::Run(RunRequest {
            language: "python".to_string(),
            code: "print('hi')\n".to_string(),
        }),
    );
    print_test_vector("run", &run);

    // Test vector 2: Input bytes
    let input = Envelope::new(
        2,
        Event::Input(InputData {
            data: b"5\n".to_vec(),
        }),
    );
    print_test_vector("input", &input);

    // Test vector 3: Disconnect
    let disconnect = Envelope::new(3, Event::Disconnect);
    print_test_vector("disconnect", &disconnect);

    // Test vector 4: Output chunk
    let output = Envelope::new(4, Event::Output(OutputChunk::new("hi\r\n")));
    print_test_vector("output", &output);

    // Test vector 5: Unsupported language diagnostic
    let unsupported = Envelope::new(5, Event::Output(OutputChunk::new("Unsupported language")));
    print_test_vector("unsupported", &unsupported);
}

fn print_test_vector(name: &str, envelope: &Envelope) {
    let bytes = envelope.to_msgpack().expect("serialization failed");
    print!("export const {} = new Uint8Array([", name);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            print!(", ");
        }
        print!("{}", b);
    }
    println!("]);");
}
